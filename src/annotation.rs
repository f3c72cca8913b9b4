// 该文件是 Shanan （山南西风） 项目的一部分。
// src/annotation.rs - 标注视图: 文本框、时间点与对齐关系
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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{config::Parameters, timeunit::TimeUnit};

pub const APP_IDENTIFIER: &str = concat!("shanan-east/", env!("CARGO_PKG_VERSION"));
pub const TEXT_BOX_TYPE: &str = "text";

/// 原图坐标下的文本框
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBox {
  pub start_x: i32,
  pub start_y: i32,
  pub end_x: i32,
  pub end_y: i32,
}

impl TextBox {
  /// `[左上, 右上, 左下, 右下]`
  pub fn corners(&self) -> Quad {
    Quad([
      [self.start_x, self.start_y],
      [self.end_x, self.start_y],
      [self.start_x, self.end_y],
      [self.end_x, self.end_y],
    ])
  }
}

/// 四个角点，顺序为左上、右上、左下、右下
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad(pub [[i32; 2]; 4]);

impl Quad {
  pub fn top_left(&self) -> [i32; 2] {
    self.0[0]
  }

  pub fn top_right(&self) -> [i32; 2] {
    self.0[1]
  }

  pub fn bottom_left(&self) -> [i32; 2] {
    self.0[2]
  }

  pub fn bottom_right(&self) -> [i32; 2] {
    self.0[3]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
  pub id: String,
  pub box_type: String,
  pub coordinates: Quad,
  /// 合并框记录其来源框
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub merged_from: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
  pub id: String,
  pub time_unit: TimeUnit,
  pub time_point: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
  pub id: String,
  /// 时间点 id
  pub source: String,
  /// 文本框 id
  pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", content = "properties")]
pub enum Annotation {
  BoundingBox(Detection),
  TimePoint(TimePoint),
  Alignment(Alignment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewMetadata {
  pub app: String,
  pub timestamp: DateTime<Utc>,
  pub document: String,
  pub parameters: serde_json::Value,
}

/// 一次运行产生的全部标注
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationView {
  pub metadata: ViewMetadata,
  pub annotations: Vec<Annotation>,
  #[serde(skip)]
  counters: Counters,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Counters {
  boxes: usize,
  time_points: usize,
  alignments: usize,
}

impl AnnotationView {
  pub fn new(document: impl Into<String>, parameters: &Parameters) -> Self {
    Self {
      metadata: ViewMetadata {
        app: APP_IDENTIFIER.to_string(),
        timestamp: Utc::now(),
        document: document.into(),
        parameters: serde_json::to_value(parameters).unwrap_or(serde_json::Value::Null),
      },
      annotations: Vec::new(),
      counters: Counters::default(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.annotations.is_empty()
  }

  /// 添加文本框，返回其 id
  pub fn push_box(&mut self, coordinates: Quad, merged_from: Option<Vec<String>>) -> String {
    self.counters.boxes += 1;
    let id = format!("bb{}", self.counters.boxes);
    self.annotations.push(Annotation::BoundingBox(Detection {
      id: id.clone(),
      box_type: TEXT_BOX_TYPE.to_string(),
      coordinates,
      merged_from,
    }));
    id
  }

  pub fn push_time_point(&mut self, time_unit: TimeUnit, time_point: f64) -> String {
    self.counters.time_points += 1;
    let id = format!("tp{}", self.counters.time_points);
    self.annotations.push(Annotation::TimePoint(TimePoint {
      id: id.clone(),
      time_unit,
      time_point,
    }));
    id
  }

  pub fn push_alignment(&mut self, source: &str, target: &str) -> String {
    self.counters.alignments += 1;
    let id = format!("al{}", self.counters.alignments);
    self.annotations.push(Annotation::Alignment(Alignment {
      id: id.clone(),
      source: source.to_string(),
      target: target.to_string(),
    }));
    id
  }

  pub fn detections(&self) -> impl Iterator<Item = &Detection> {
    self.annotations.iter().filter_map(|a| match a {
      Annotation::BoundingBox(d) => Some(d),
      _ => None,
    })
  }

  pub fn time_points(&self) -> impl Iterator<Item = &TimePoint> {
    self.annotations.iter().filter_map(|a| match a {
      Annotation::TimePoint(t) => Some(t),
      _ => None,
    })
  }

  pub fn alignments(&self) -> impl Iterator<Item = &Alignment> {
    self.annotations.iter().filter_map(|a| match a {
      Annotation::Alignment(al) => Some(al),
      _ => None,
    })
  }

  /// 通过对齐关系找到文本框所在的时间点
  pub fn time_point_of(&self, detection_id: &str) -> Option<&TimePoint> {
    let source = self
      .alignments()
      .find(|al| al.target == detection_id)
      .map(|al| al.source.as_str())?;
    self.time_points().find(|tp| tp.id == source)
  }
}
