// 该文件是 Shanan （山南西风） 项目的一部分。
// src/merge.rs - 同一时间点的文本框合并
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use serde::{Deserialize, Serialize};

use crate::annotation::Quad;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeMode {
  /// 只输出合并后的框
  #[default]
  Replace,
  /// 同时保留原始框
  KeepOriginals,
}

/// 将多个四边形折叠为一个外接四边形
///
/// 每个角点的每个坐标轴独立取极值: 左上取 (min x, min y)，右上取 (max x, min y)，
/// 左下取 (min x, max y)，右下取 (max x, max y)。结果与输入顺序无关，输入为空时返回 `None`。
pub fn merge_quads<I>(quads: I) -> Option<Quad>
where
  I: IntoIterator<Item = Quad>,
{
  let mut quads = quads.into_iter();
  let first = quads.next()?;
  Some(quads.fold(first, |acc, q| {
    let [tl, tr, bl, br] = acc.0;
    Quad([
      [tl[0].min(q.top_left()[0]), tl[1].min(q.top_left()[1])],
      [tr[0].max(q.top_right()[0]), tr[1].min(q.top_right()[1])],
      [bl[0].min(q.bottom_left()[0]), bl[1].max(q.bottom_left()[1])],
      [br[0].max(q.bottom_right()[0]), br[1].max(q.bottom_right()[1])],
    ])
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merges_per_corner_per_axis() {
    let a = Quad([[0, 0], [10, 0], [0, 10], [10, 10]]);
    let b = Quad([[2, 2], [8, 1], [1, 9], [9, 11]]);
    let merged = merge_quads([a, b]).unwrap();
    assert_eq!(merged, Quad([[0, 0], [10, 0], [0, 10], [10, 11]]));
    assert_eq!(merge_quads([b, a]), Some(merged));
  }

  #[test]
  fn single_box_is_identity() {
    let a = Quad([[3, 4], [9, 4], [3, 7], [9, 7]]);
    assert_eq!(merge_quads([a]), Some(a));
  }

  #[test]
  fn empty_group_has_no_result() {
    assert_eq!(merge_quads(Vec::new()), None);
  }
}
