// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! # GStreamer 视频输入
//!
//! 通过 `gst://file/path/to/video.mp4` 打开视频文件，解码为 RGB 帧。
//!
//! 帧按顺序解码：请求的帧序号不小于当前位置时向前读取并丢弃中间帧，
//! 请求更早的帧时重新打开管道。文本检测按升序取帧，因此通常只会顺序读取一遍。
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, decoded_path, input::FrameSource};

/// 等待管道进入暂停状态的最长时间
const PREROLL_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum GStreamerInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("不支持的来源: {0}")]
  UnsupportedSource(String),
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("状态改变错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("无法获取 appsink 元素")]
  AppSinkNotFound,
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("帧率无效")]
  InvalidFrameRate,
  #[error("不支持的视频格式: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

struct Playback {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  /// 下一次 pull 得到的帧序号
  next_index: u64,
}

impl Playback {
  fn open(location: &str) -> Result<Self, GStreamerInputError> {
    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
       appsink name=sink sync=false max-buffers=4",
      location.replace('"', "\\\"")
    );
    debug!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("无法创建管道".to_string()))?;
    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkNotFound)?;

    pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    result?;

    Ok(Playback {
      pipeline,
      appsink,
      next_index: 0,
    })
  }

  fn video_info(&self) -> Result<gst_video::VideoInfo, GStreamerInputError> {
    let caps = self
      .appsink
      .static_pad("sink")
      .and_then(|pad| pad.current_caps())
      .ok_or(GStreamerInputError::VideoInfoError)?;
    gst_video::VideoInfo::from_caps(&caps).map_err(|_| GStreamerInputError::VideoInfoError)
  }

  fn play(&self) -> Result<(), GStreamerInputError> {
    self.pipeline.set_state(gst::State::Playing)?;
    Ok(())
  }

  /// `None` 表示已到达流末尾
  fn pull(&mut self) -> Result<Option<gst::Sample>, GStreamerInputError> {
    match self.appsink.pull_sample() {
      Ok(sample) => {
        self.next_index += 1;
        Ok(Some(sample))
      }
      Err(_) if self.appsink.is_eos() => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

impl Drop for Playback {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止 GStreamer 管道失败: {}", e);
    }
  }
}

/// GStreamer 解码的视频文件
pub struct GStreamerInput {
  location: String,
  playback: Playback,
  frame_rate: f64,
  frame_count: Option<u64>,
}

impl FromUrlWithScheme for GStreamerInput {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInput {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }
    match url.host_str() {
      Some("file") => Self::open(&decoded_path(url)),
      other => Err(GStreamerInputError::UnsupportedSource(
        other.unwrap_or_default().to_string(),
      )),
    }
  }
}

impl GStreamerInput {
  pub fn open(location: &str) -> Result<Self, GStreamerInputError> {
    gst::init()?;

    let playback = Playback::open(location)?;
    let info = playback.video_info()?;
    let fps = info.fps();
    if fps.numer() <= 0 || fps.denom() <= 0 {
      return Err(GStreamerInputError::InvalidFrameRate);
    }
    let frame_rate = f64::from(fps.numer()) / f64::from(fps.denom());

    let frame_count = playback
      .pipeline
      .query_duration::<gst::ClockTime>()
      .map(|d| (d.nseconds() as f64 / 1e9 * frame_rate).round() as u64);

    info!(
      "打开视频 {}: {}x{}, {:.3} fps, {:?} 帧",
      location,
      info.width(),
      info.height(),
      frame_rate,
      frame_count
    );
    playback.play()?;

    Ok(GStreamerInput {
      location: location.to_string(),
      playback,
      frame_rate,
      frame_count,
    })
  }

  pub fn location(&self) -> &str {
    &self.location
  }

  fn rewind(&mut self) -> Result<(), GStreamerInputError> {
    debug!("请求更早的帧，重新打开 {}", self.location);
    let playback = Playback::open(&self.location)?;
    playback.play()?;
    self.playback = playback;
    Ok(())
  }
}

impl FrameSource for GStreamerInput {
  type Error = GStreamerInputError;

  fn frame_count(&self) -> Option<u64> {
    self.frame_count
  }

  fn frame_rate(&self) -> f64 {
    self.frame_rate
  }

  fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error> {
    if index < self.playback.next_index {
      self.rewind()?;
    }
    while self.playback.next_index < index {
      if self.playback.pull()?.is_none() {
        return Ok(None);
      }
    }
    match self.playback.pull()? {
      Some(sample) => sample_to_image(&sample).map(Some),
      None => Ok(None),
    }
  }
}

fn sample_to_image(sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有 caps".to_string()))?;
  let info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat(info.format()));
  }

  let width = info.width() as usize;
  let height = info.height() as usize;
  let stride = info.stride()[0] as usize;
  let row = width * 3;

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::PipelineError(format!("无法映射缓冲区: {}", e)))?;
  let data = map.as_slice();
  let expected = stride * (height.saturating_sub(1)) + row;
  if data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  // 每行可能有对齐填充
  let mut pixels = Vec::with_capacity(row * height);
  for y in 0..height {
    pixels.extend_from_slice(&data[y * stride..y * stride + row]);
  }
  RgbImage::from_raw(info.width(), info.height(), pixels)
    .ok_or_else(|| GStreamerInputError::PipelineError("帧尺寸错误".to_string()))
}
