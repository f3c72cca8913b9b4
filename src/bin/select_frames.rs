// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/select_frames.rs - 打印选帧结果
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

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use url::Url;

use shanan_east::{
  FromUrl,
  config::{DEFAULT_SAMPLE_RATIO, DEFAULT_STOP_AT},
  input::{Document, FrameSource, InputWrapper},
  sampler::{FrameSampler, load_segments},
};
use tracing::info;

/// 不加载模型，只输出将被检测的帧
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 视频来源：frames:// 或 gst://file/
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 时间片段 JSON 文件
  #[arg(long, value_name = "FILE")]
  pub segments: Option<PathBuf>,
  #[arg(long, value_name = "TYPE")]
  pub frame_type: Vec<String>,
  #[arg(long, default_value_t = DEFAULT_SAMPLE_RATIO, allow_negative_numbers = true)]
  pub sample_ratio: i64,
  #[arg(long, default_value_t = DEFAULT_STOP_AT)]
  pub stop_at: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  info!("输入来源: {}", args.input);

  let segments = match &args.segments {
    Some(path) => load_segments(path)?,
    None => Vec::new(),
  };
  let video = match InputWrapper::from_url(&args.input)?.into_document() {
    Document::Video(video) => video,
    Document::Image { location, .. } => bail!("{} 不是视频", location),
  };

  let selection = FrameSampler::new(args.sample_ratio, args.stop_at)?
    .with_frame_types(args.frame_type.into_iter().collect())
    .select(&segments, video.frame_count(), video.frame_rate())?;
  info!("选中 {} 帧 ({:?})", selection.len(), selection.policy());

  println!("{}", serde_json::to_string_pretty(&selection)?);
  Ok(())
}
