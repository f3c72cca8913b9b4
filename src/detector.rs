// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector.rs - EAST 后处理: 解码、抑制、还原
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

use tracing::debug;

use crate::{annotation::TextBox, frame::ScaleRatio, model::EastTensors};

mod decode;
mod nms;
mod rescale;

pub use self::decode::{EAST_STRIDE, decode};
pub use self::nms::{DEFAULT_OVERLAP_THRESHOLD, suppress};
pub use self::rescale::rescale;

/// 默认最小置信度
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.1;

/// 模型坐标系下的候选框
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
  pub start_x: i32,
  pub start_y: i32,
  pub end_x: i32,
  pub end_y: i32,
}

/// 单帧检测阶段，供流水线记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStage {
  Decode,
  Suppress,
  Rescale,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EastDetector {
  min_confidence: f32,
  overlap_threshold: f32,
}

impl Default for EastDetector {
  fn default() -> Self {
    Self {
      min_confidence: DEFAULT_MIN_CONFIDENCE,
      overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
    }
  }
}

impl EastDetector {
  pub fn new(min_confidence: f32, overlap_threshold: f32) -> Self {
    Self {
      min_confidence,
      overlap_threshold,
    }
  }

  /// 完整的后处理，返回原图坐标下的文本框
  pub fn detect(&self, tensors: &EastTensors, ratio: ScaleRatio) -> Vec<TextBox> {
    self.detect_with(tensors, ratio, |_| {})
  }

  /// 同 [`EastDetector::detect`]，每进入一个阶段调用一次 `on_stage`
  pub fn detect_with<F>(
    &self,
    tensors: &EastTensors,
    ratio: ScaleRatio,
    mut on_stage: F,
  ) -> Vec<TextBox>
  where
    F: FnMut(DetectStage),
  {
    on_stage(DetectStage::Decode);
    let (candidates, confidences): (Vec<Candidate>, Vec<f32>) =
      decode(tensors, self.min_confidence).unzip();

    on_stage(DetectStage::Suppress);
    let kept = suppress(&candidates, &confidences, self.overlap_threshold);
    debug!("候选框 {} 个，抑制后保留 {} 个", candidates.len(), kept.len());

    on_stage(DetectStage::Rescale);
    kept.iter().map(|c| rescale(c, ratio)).collect()
  }
}
