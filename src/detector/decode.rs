// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/decode.rs - EAST 几何张量解码
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

use crate::{detector::Candidate, model::EastTensors};

/// 特征图相对模型输入缩小 4 倍
pub const EAST_STRIDE: f64 = 4.0;

/// 逐单元解码候选框
///
/// 按行优先顺序扫描 `(row, col)`，分数不低于 `min_confidence` 的单元产生一个
/// 候选框及其置信度。分数为 NaN 的单元会被跳过。
pub fn decode(
  tensors: &EastTensors,
  min_confidence: f32,
) -> impl Iterator<Item = (Candidate, f32)> + '_ {
  let cols = tensors.cols();
  (0..tensors.rows())
    .flat_map(move |y| (0..cols).map(move |x| (y, x)))
    .filter_map(move |(y, x)| {
      let score = tensors.score(y, x);
      if score >= min_confidence {
        Some((decode_cell(tensors, y, x), score))
      } else {
        None
      }
    })
}

fn decode_cell(tensors: &EastTensors, y: usize, x: usize) -> Candidate {
  let offset_x = x as f64 * EAST_STRIDE;
  let offset_y = y as f64 * EAST_STRIDE;

  let g = |c: usize| f64::from(tensors.geometry(c, y, x));
  let (top, right, bottom, left, angle) = (g(0), g(1), g(2), g(3), g(4));
  let (sin, cos) = angle.sin_cos();

  let h = top + bottom;
  let w = right + left;

  // 先截断终点，再由截断后的终点推出起点
  let end_x = (offset_x + cos * right + sin * bottom) as i32;
  let end_y = (offset_y - sin * right + cos * bottom) as i32;
  let start_x = (f64::from(end_x) - w) as i32;
  let start_y = (f64::from(end_y) - h) as i32;

  Candidate {
    start_x,
    start_y,
    end_x,
    end_y,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// 2x2 特征图，分数依次为 0.05, 0.2, 0.5, 0.9
  fn tensors() -> EastTensors {
    let scores = vec![0.05, 0.2, 0.5, 0.9];
    let mut geometry = Vec::new();
    // top, right, bottom, left 四个通道都取 2.5，角度为 0
    for _ in 0..4 {
      geometry.extend_from_slice(&[2.5; 4]);
    }
    geometry.extend_from_slice(&[0.0; 4]);
    EastTensors::new(2, 2, scores, geometry).unwrap()
  }

  #[test]
  fn axis_aligned_cell() {
    let boxes: Vec<_> = decode(&tensors(), 0.85).collect();
    assert_eq!(boxes.len(), 1);
    let (candidate, score) = boxes[0];
    assert_eq!(score, 0.9);
    // 单元 (1, 1): 偏移 (4, 4)，终点 (6.5, 6.5) 截断为 (6, 6)，起点 6 - 5 = 1
    assert_eq!(
      candidate,
      Candidate {
        start_x: 1,
        start_y: 1,
        end_x: 6,
        end_y: 6
      }
    );
  }

  #[test]
  fn row_major_order() {
    let scores: Vec<f32> = decode(&tensors(), 0.1).map(|(_, s)| s).collect();
    assert_eq!(scores, vec![0.2, 0.5, 0.9]);
  }

  #[test]
  fn raising_threshold_never_adds_boxes() {
    let tensors = tensors();
    let mut previous = usize::MAX;
    for tau in [0.0, 0.1, 0.3, 0.6, 0.95] {
      let count = decode(&tensors, tau).count();
      assert!(count <= previous);
      previous = count;
    }
    assert_eq!(decode(&tensors, 0.95).count(), 0);
  }

  #[test]
  fn rotated_cell_uses_angle() {
    let angle = std::f32::consts::FRAC_PI_2;
    let geometry = vec![1.0, 2.0, 3.5, 4.0, angle];
    let tensors = EastTensors::new(1, 1, vec![1.0], geometry).unwrap();
    let (candidate, _) = decode(&tensors, 0.5).next().unwrap();
    // cos ~ 0, sin ~ 1: end = (3.5, -2)，宽 6 高 4.5，向零截断
    assert_eq!(candidate.end_x, 3);
    assert_eq!(candidate.end_y, -2);
    assert_eq!(candidate.start_x, -3);
    assert_eq!(candidate.start_y, -6);
  }

  #[test]
  fn nan_scores_are_skipped() {
    let tensors = EastTensors::new(1, 1, vec![f32::NAN], vec![0.0; 5]).unwrap();
    assert_eq!(decode(&tensors, 0.0).count(), 0);
  }
}
