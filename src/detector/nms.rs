// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/nms.rs - 非极大值抑制
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

use std::cmp::Reverse;

use crate::detector::Candidate;

/// 默认重叠阈值
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.3;

impl Candidate {
  /// 按包含端点的像素范围计算面积
  pub fn area(&self) -> i64 {
    let w = i64::from(self.end_x) - i64::from(self.start_x) + 1;
    let h = i64::from(self.end_y) - i64::from(self.start_y) + 1;
    w * h
  }

  /// 交集面积除以 `self` 自身的面积
  ///
  /// 面积不为正的退化框视为不重叠。
  pub fn overlap_ratio(&self, kept: &Candidate) -> f32 {
    let area = self.area();
    if area <= 0 {
      return 0.0;
    }
    let xx1 = self.start_x.max(kept.start_x);
    let yy1 = self.start_y.max(kept.start_y);
    let xx2 = self.end_x.min(kept.end_x);
    let yy2 = self.end_y.min(kept.end_y);
    let w = (i64::from(xx2) - i64::from(xx1) + 1).max(0);
    let h = (i64::from(yy2) - i64::from(yy1) + 1).max(0);
    ((w * h) as f64 / area as f64) as f32
  }
}

/// 贪心抑制
///
/// 每轮取出剩余置信度最高的框，丢弃与其重叠比例超过 `threshold` 的剩余框。
/// 置信度相同时先解码出的框优先。返回的框按保留顺序排列。
pub fn suppress(candidates: &[Candidate], confidences: &[f32], threshold: f32) -> Vec<Candidate> {
  let count = candidates.len().min(confidences.len());

  // 升序排列，从尾部弹出最高置信度；同分时下标小的排在后面
  let mut order: Vec<usize> = (0..count).collect();
  order.sort_by(|&a, &b| {
    confidences[a]
      .total_cmp(&confidences[b])
      .then_with(|| Reverse(a).cmp(&Reverse(b)))
  });

  let mut kept = Vec::new();
  while let Some(best) = order.pop() {
    let seed = candidates[best];
    kept.push(seed);
    order.retain(|&other| candidates[other].overlap_ratio(&seed) <= threshold);
  }
  kept
}
