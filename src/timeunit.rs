// 该文件是 Shanan （山南西风） 项目的一部分。
// src/timeunit.rs - 帧序号与时间单位换算
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

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeUnitError {
  #[error("不支持的时间单位: {0}")]
  UnsupportedUnit(String),
  #[error("帧率无效: {0}")]
  InvalidFrameRate(f64),
}

/// 输出时间点使用的单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeUnit {
  #[default]
  Frames,
  Seconds,
  Milliseconds,
}

impl TimeUnit {
  pub fn as_str(&self) -> &'static str {
    match self {
      TimeUnit::Frames => "frames",
      TimeUnit::Seconds => "seconds",
      TimeUnit::Milliseconds => "milliseconds",
    }
  }

  /// 帧序号 -> 本单位下的时间值
  pub fn time_of_frame(self, index: u64, frame_rate: f64) -> Result<f64, TimeUnitError> {
    match self {
      TimeUnit::Frames => Ok(index as f64),
      TimeUnit::Seconds => Ok(index as f64 / checked_rate(frame_rate)?),
      TimeUnit::Milliseconds => Ok(index as f64 / checked_rate(frame_rate)? * 1000.0),
    }
  }

  /// 本单位下的时间值 -> 帧序号（未取整）
  pub fn frames_of(self, value: f64, frame_rate: f64) -> Result<f64, TimeUnitError> {
    match self {
      TimeUnit::Frames => Ok(value),
      TimeUnit::Seconds => Ok(value * checked_rate(frame_rate)?),
      TimeUnit::Milliseconds => Ok(value * checked_rate(frame_rate)? / 1000.0),
    }
  }
}

fn checked_rate(frame_rate: f64) -> Result<f64, TimeUnitError> {
  if frame_rate.is_finite() && frame_rate > 0.0 {
    Ok(frame_rate)
  } else {
    Err(TimeUnitError::InvalidFrameRate(frame_rate))
  }
}

impl FromStr for TimeUnit {
  type Err = TimeUnitError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "frames" => Ok(TimeUnit::Frames),
      "seconds" => Ok(TimeUnit::Seconds),
      "milliseconds" => Ok(TimeUnit::Milliseconds),
      other => Err(TimeUnitError::UnsupportedUnit(other.to_string())),
    }
  }
}

impl TryFrom<String> for TimeUnit {
  type Error = TimeUnitError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<TimeUnit> for String {
  fn from(unit: TimeUnit) -> Self {
    unit.as_str().to_string()
  }
}

impl fmt::Display for TimeUnit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 按字符串单位换算帧序号，未知单位直接报错
pub fn convert(index: u64, frame_rate: f64, unit: &str) -> Result<f64, TimeUnitError> {
  unit.parse::<TimeUnit>()?.time_of_frame(index, frame_rate)
}
