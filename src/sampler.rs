// 该文件是 Shanan （山南西风） 项目的一部分。
// src/sampler.rs - 待检测帧的选择
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

use std::{
  collections::{BTreeSet, btree_set},
  num::NonZeroU64,
  path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::Parameters,
  timeunit::{TimeUnit, TimeUnitError},
};

/// 每个片段内均匀取样的帧数
pub const SAMPLES_PER_SEGMENT: u32 = 2;

#[derive(Error, Debug)]
pub enum SamplerError {
  #[error("采样间隔必须为正整数, 实际为 {0}")]
  NonPositiveSampleRatio(i64),
  #[error("片段时间换算失败: {0}")]
  TimeUnit(#[from] TimeUnitError),
  #[error("读取片段文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("片段文件格式错误: {0}")]
  Segments(#[from] serde_json::Error),
}

/// 外部提供的时间片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSegment {
  pub start: f64,
  pub end: f64,
  pub frame_type: String,
  #[serde(default)]
  pub time_unit: TimeUnit,
}

/// 从 JSON 文件读取片段列表
pub fn load_segments(path: impl AsRef<Path>) -> Result<Vec<TimeSegment>, SamplerError> {
  let file = std::fs::File::open(path)?;
  let segments = serde_json::from_reader(std::io::BufReader::new(file))?;
  Ok(segments)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionPolicy {
  Uniform,
  Segments,
}

/// 严格递增、无重复的帧序号
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSelection {
  policy: SelectionPolicy,
  frames: Vec<u64>,
}

impl FrameSelection {
  fn new(policy: SelectionPolicy, frames: BTreeSet<u64>) -> Self {
    Self {
      policy,
      frames: frames.into_iter().collect(),
    }
  }

  pub fn policy(&self) -> SelectionPolicy {
    self.policy
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn as_slice(&self) -> &[u64] {
    &self.frames
  }

  pub fn iter(&self) -> std::slice::Iter<'_, u64> {
    self.frames.iter()
  }
}

impl<'a> IntoIterator for &'a FrameSelection {
  type Item = &'a u64;
  type IntoIter = std::slice::Iter<'a, u64>;

  fn into_iter(self) -> Self::IntoIter {
    self.frames.iter()
  }
}

#[derive(Debug, Clone)]
pub struct FrameSampler {
  sample_ratio: NonZeroU64,
  stop_at: u64,
  frame_types: BTreeSet<String>,
}

impl FrameSampler {
  pub fn new(sample_ratio: i64, stop_at: u64) -> Result<Self, SamplerError> {
    let sample_ratio = u64::try_from(sample_ratio)
      .ok()
      .and_then(NonZeroU64::new)
      .ok_or(SamplerError::NonPositiveSampleRatio(sample_ratio))?;
    Ok(Self {
      sample_ratio,
      stop_at,
      frame_types: BTreeSet::new(),
    })
  }

  pub fn from_parameters(params: &Parameters) -> Result<Self, SamplerError> {
    Ok(Self::new(params.sample_ratio, params.stop_at)?.with_frame_types(params.frame_type.clone()))
  }

  /// 空集合表示接受任意类型的片段
  pub fn with_frame_types(mut self, frame_types: BTreeSet<String>) -> Self {
    self.frame_types = frame_types;
    self
  }

  fn accepts(&self, segment: &TimeSegment) -> bool {
    self.frame_types.is_empty() || self.frame_types.contains(&segment.frame_type)
  }

  /// 帧序号上界（不含）
  fn bound(&self, frame_count: Option<u64>) -> u64 {
    frame_count.map_or(self.stop_at, |n| n.min(self.stop_at))
  }

  /// 选择待检测的帧
  ///
  /// 存在匹配的片段时按片段取样，否则按 `sample_ratio` 均匀取样。
  /// `frame_count` 未知时只受 `stop_at` 约束。
  pub fn select(
    &self,
    segments: &[TimeSegment],
    frame_count: Option<u64>,
    frame_rate: f64,
  ) -> Result<FrameSelection, SamplerError> {
    let bound = self.bound(frame_count);
    let matched: Vec<&TimeSegment> = segments.iter().filter(|s| self.accepts(s)).collect();

    let selection = if matched.is_empty() {
      debug!("没有匹配的片段，按间隔 {} 均匀取样", self.sample_ratio);
      let frames = (0..bound).step_by(self.sample_ratio.get() as usize).collect();
      FrameSelection::new(SelectionPolicy::Uniform, frames)
    } else {
      debug!("按 {} 个匹配片段取样", matched.len());
      let mut frames = BTreeSet::new();
      for segment in matched {
        frames.extend(segment_samples(segment, frame_rate)?);
      }
      frames.retain(|&f| f < bound);
      FrameSelection::new(SelectionPolicy::Segments, frames)
    };

    info!(
      "选中 {} 帧 ({:?}, 上界 {})",
      selection.len(),
      selection.policy(),
      bound
    );
    Ok(selection)
  }
}

/// 片段内均匀分布的取样点，按四舍五入取整，丢弃负值
fn segment_samples(
  segment: &TimeSegment,
  frame_rate: f64,
) -> Result<btree_set::IntoIter<u64>, SamplerError> {
  let a = segment.time_unit.frames_of(segment.start, frame_rate)?;
  let b = segment.time_unit.frames_of(segment.end, frame_rate)?;
  let (start, end) = (a.min(b), a.max(b));

  let steps = f64::from(SAMPLES_PER_SEGMENT - 1);
  let samples: BTreeSet<u64> = (0..SAMPLES_PER_SEGMENT)
    .map(|k| (start + (end - start) * f64::from(k) / steps).round())
    .filter(|v| v.is_finite() && *v >= 0.0)
    .map(|v| v as u64)
    .collect();
  Ok(samples.into_iter())
}
