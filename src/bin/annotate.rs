// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/annotate.rs - 文本定位标注
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

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_east::{
  FromUrl,
  config::{DEFAULT_SAMPLE_RATIO, DEFAULT_STOP_AT, Parameters},
  detector::{DEFAULT_MIN_CONFIDENCE, DEFAULT_OVERLAP_THRESHOLD},
  input::InputWrapper,
  merge::MergeMode,
  model::EastOnnxBuilder,
  output::OutputWrapper,
  sampler::load_segments,
  task::{AnnotateTask, Task},
};
use tracing::info;

/// EAST 文本定位参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 east:///models/east.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源：image://、frames:// 或 gst://file/
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出：json://、folder:// 或 image://
  #[arg(long, value_name = "OUTPUT", default_value = "json:-")]
  pub output: Url,
  /// 时间片段 JSON 文件，未提供时均匀取样
  #[arg(long, value_name = "FILE")]
  pub segments: Option<PathBuf>,
  /// 时间单位: frames、seconds 或 milliseconds
  #[arg(long, default_value = "frames", value_name = "UNIT")]
  pub time_unit: String,
  /// 只使用这些类型的片段，可重复指定
  #[arg(long, value_name = "TYPE")]
  pub frame_type: Vec<String>,
  /// 均匀取样间隔（帧）
  #[arg(long, default_value_t = DEFAULT_SAMPLE_RATIO, allow_negative_numbers = true)]
  pub sample_ratio: i64,
  /// 停止帧（不含）
  #[arg(long, default_value_t = DEFAULT_STOP_AT)]
  pub stop_at: u64,
  /// 每个时间点的文本框合并为一个
  #[arg(long)]
  pub merge_boxes: bool,
  /// 合并时保留原始文本框
  #[arg(long, requires = "merge_boxes")]
  pub keep_originals: bool,
  /// 最小置信度 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE, value_name = "THRESHOLD")]
  pub min_confidence: f32,
  /// NMS 重叠阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_OVERLAP_THRESHOLD, value_name = "THRESHOLD")]
  pub overlap_threshold: f32,
  /// 缩放前做中值滤波
  #[arg(long)]
  pub denoise: bool,
  /// 单帧推理超时（毫秒）
  #[arg(long, value_name = "MS")]
  pub inference_timeout: Option<u64>,
}

impl Args {
  fn parameters(&self) -> Result<Parameters> {
    let merge_mode = if self.keep_originals {
      MergeMode::KeepOriginals
    } else {
      MergeMode::Replace
    };
    let params = Parameters::default()
      .with_time_unit_str(&self.time_unit)?
      .with_frame_types(self.frame_type.iter().cloned())
      .with_sample_ratio(self.sample_ratio)
      .with_stop_at(self.stop_at)
      .with_merge_boxes(self.merge_boxes)
      .with_merge_mode(merge_mode)
      .with_min_confidence(self.min_confidence)
      .with_overlap_threshold(self.overlap_threshold)
      .with_denoise(self.denoise)
      .with_inference_timeout(self.inference_timeout.map(Duration::from_millis));
    params.validate()?;
    Ok(params)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let params = args.parameters()?;
  let segments = match &args.segments {
    Some(path) => load_segments(path)?,
    None => Vec::new(),
  };

  let input = InputWrapper::from_url(&args.input)?;
  let model = EastOnnxBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  AnnotateTask::new(params)
    .with_segments(segments)
    .with_interrupt_handler()?
    .run_task(input, model, output)
}
