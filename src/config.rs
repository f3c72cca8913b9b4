// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 调用参数
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

use std::{collections::BTreeSet, time::Duration};

use serde::Serialize;
use thiserror::Error;

use crate::{
  detector::{DEFAULT_MIN_CONFIDENCE, DEFAULT_OVERLAP_THRESHOLD},
  merge::MergeMode,
  timeunit::{TimeUnit, TimeUnitError},
};

pub const DEFAULT_SAMPLE_RATIO: i64 = 30;
/// 30 fps 下约 2 小时
pub const DEFAULT_STOP_AT: u64 = 216_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("采样间隔必须为正整数, 实际为 {0}")]
  NonPositiveSampleRatio(i64),
  #[error("停止帧必须为正整数")]
  ZeroStopAt,
  #[error("{name} 超出 [0, 1] 范围: {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("时间单位错误: {0}")]
  TimeUnit(#[from] TimeUnitError),
}

/// 文本检测任务参数
///
/// 在进入流水线之前调用 [`Parameters::validate`] 校验，
/// 流水线内部不再重复检查。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
  pub time_unit: TimeUnit,
  /// 空集合表示匹配所有片段类型
  pub frame_type: BTreeSet<String>,
  pub sample_ratio: i64,
  /// 不包含该帧
  pub stop_at: u64,
  pub merge_boxes: bool,
  pub merge_mode: MergeMode,
  pub min_confidence: f32,
  pub overlap_threshold: f32,
  pub denoise: bool,
  #[serde(skip)]
  pub inference_timeout: Option<Duration>,
}

impl Default for Parameters {
  fn default() -> Self {
    Self {
      time_unit: TimeUnit::Frames,
      frame_type: BTreeSet::new(),
      sample_ratio: DEFAULT_SAMPLE_RATIO,
      stop_at: DEFAULT_STOP_AT,
      merge_boxes: false,
      merge_mode: MergeMode::Replace,
      min_confidence: DEFAULT_MIN_CONFIDENCE,
      overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
      denoise: false,
      inference_timeout: None,
    }
  }
}

impl Parameters {
  pub fn with_time_unit(mut self, time_unit: TimeUnit) -> Self {
    self.time_unit = time_unit;
    self
  }

  /// 字符串形式的时间单位，未知单位返回错误
  pub fn with_time_unit_str(self, time_unit: &str) -> Result<Self, ConfigError> {
    Ok(self.with_time_unit(time_unit.parse()?))
  }

  pub fn with_frame_types<I, S>(mut self, frame_types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.frame_type = frame_types.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_sample_ratio(mut self, sample_ratio: i64) -> Self {
    self.sample_ratio = sample_ratio;
    self
  }

  pub fn with_stop_at(mut self, stop_at: u64) -> Self {
    self.stop_at = stop_at;
    self
  }

  pub fn with_merge_boxes(mut self, merge_boxes: bool) -> Self {
    self.merge_boxes = merge_boxes;
    self
  }

  pub fn with_merge_mode(mut self, merge_mode: MergeMode) -> Self {
    self.merge_mode = merge_mode;
    self
  }

  pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }

  pub fn with_overlap_threshold(mut self, overlap_threshold: f32) -> Self {
    self.overlap_threshold = overlap_threshold;
    self
  }

  pub fn with_denoise(mut self, denoise: bool) -> Self {
    self.denoise = denoise;
    self
  }

  pub fn with_inference_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.inference_timeout = timeout;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.sample_ratio <= 0 {
      return Err(ConfigError::NonPositiveSampleRatio(self.sample_ratio));
    }
    if self.stop_at == 0 {
      return Err(ConfigError::ZeroStopAt);
    }
    check_unit_range("minConfidence", self.min_confidence)?;
    check_unit_range("overlapThreshold", self.overlap_threshold)?;
    Ok(())
  }
}

fn check_unit_range(name: &'static str, value: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::ThresholdOutOfRange { name, value })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let params = Parameters::default();
    assert!(params.validate().is_ok());
    assert_eq!(params.sample_ratio, 30);
    assert_eq!(params.time_unit, TimeUnit::Frames);
    assert!(params.frame_type.is_empty());
    assert!(!params.merge_boxes);
  }

  #[test]
  fn non_positive_sample_ratio_is_rejected() {
    for ratio in [0, -5] {
      let params = Parameters::default().with_sample_ratio(ratio);
      assert_eq!(
        params.validate(),
        Err(ConfigError::NonPositiveSampleRatio(ratio))
      );
    }
  }

  #[test]
  fn unsupported_time_unit_is_a_config_error() {
    let err = Parameters::default()
      .with_time_unit_str("fortnights")
      .unwrap_err();
    assert_eq!(
      err,
      ConfigError::TimeUnit(TimeUnitError::UnsupportedUnit("fortnights".into()))
    );
  }

  #[test]
  fn thresholds_must_be_fractions() {
    let params = Parameters::default().with_min_confidence(1.5);
    assert!(matches!(
      params.validate(),
      Err(ConfigError::ThresholdOutOfRange { name: "minConfidence", .. })
    ));
    let params = Parameters::default().with_overlap_threshold(f32::NAN);
    assert!(params.validate().is_err());
  }

  #[test]
  fn serializes_in_camel_case() {
    let params = Parameters::default().with_frame_types(["slate", "chyron"]);
    let value = serde_json::to_value(&params).unwrap();
    assert_eq!(value["timeUnit"], "frames");
    assert_eq!(value["sampleRatio"], 30);
    assert_eq!(value["frameType"], serde_json::json!(["chyron", "slate"]));
    assert!(value.get("inferenceTimeout").is_none());
  }
}
