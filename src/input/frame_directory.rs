// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/frame_directory.rs - 以帧图像目录作为视频输入
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decoded_path, input::FrameSource, query_value};

const DEFAULT_FRAME_RATE: f64 = 30.0;
const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum FrameDirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("帧率参数无效: {0}")]
  InvalidFrameRate(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧 {index} 解码失败: {source}")]
  Decode {
    index: u64,
    #[source]
    source: image::ImageError,
  },
}

/// 目录中按文件名排序的帧图像，第 i 个文件即第 i 帧
pub struct FrameDirectoryInput {
  location: String,
  frames: Vec<PathBuf>,
  frame_rate: f64,
}

impl FromUrlWithScheme for FrameDirectoryInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for FrameDirectoryInput {
  type Error = FrameDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FrameDirectoryInputError::SchemeMismatch);
    }

    let frame_rate = match query_value(url, "fps") {
      Some(v) => v
        .parse::<f64>()
        .ok()
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .ok_or(FrameDirectoryInputError::InvalidFrameRate(v))?,
      None => DEFAULT_FRAME_RATE,
    };

    let location = decoded_path(url);
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(&location)? {
      let path = entry?.path();
      let is_frame = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if is_frame && path.is_file() {
        frames.push(path);
      }
    }
    // 编号帧按数值排在前面，其余按文件名
    frames.sort_by_cached_key(|p| (frame_number(p).is_none(), frame_number(p), p.clone()));
    info!(
      "帧目录 {}: {} 帧, {} fps",
      location,
      frames.len(),
      frame_rate
    );

    Ok(FrameDirectoryInput {
      location,
      frames,
      frame_rate,
    })
  }
}

/// 文件名末尾的数字，`frame_12.png` 为 12
fn frame_number(path: &Path) -> Option<u64> {
  let stem = path.file_stem()?.to_str()?;
  let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
  stem[prefix.len()..].parse().ok()
}

impl FrameDirectoryInput {
  pub fn location(&self) -> &str {
    &self.location
  }
}

impl FrameSource for FrameDirectoryInput {
  type Error = FrameDirectoryInputError;

  fn frame_count(&self) -> Option<u64> {
    Some(self.frames.len() as u64)
  }

  fn frame_rate(&self) -> f64 {
    self.frame_rate
  }

  fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error> {
    let Some(path) = usize::try_from(index).ok().and_then(|i| self.frames.get(i)) else {
      return Ok(None);
    };
    debug!("读取第 {} 帧: {}", index, path.display());
    let image = image::open(path)
      .map_err(|source| FrameDirectoryInputError::Decode { index, source })?
      .to_rgb8();
    Ok(Some(image))
  }
}
