// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use image::RgbImage;
use thiserror::Error;

use crate::FromUrl;

pub trait AsNhwcFrame<const W: u32, const H: u32> {
  fn as_nhwc(&self) -> &[u8];
}

/// 可按帧序号解码的视频
pub trait FrameSource {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 总帧数，未知时为 `None`
  fn frame_count(&self) -> Option<u64>;

  fn frame_rate(&self) -> f64;

  /// `Ok(None)` 表示该帧不存在（视频已结束）
  fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error>;
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "frame_directory")]
mod frame_directory;
#[cfg(feature = "frame_directory")]
pub use self::frame_directory::{FrameDirectoryInput, FrameDirectoryInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "frame_directory")]
  #[error("帧目录输入错误: {0}")]
  FrameDirectoryInputError(#[from] FrameDirectoryInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "frame_directory")]
  FrameDirectory(FrameDirectoryInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInput::SCHEME {
        return Ok(InputWrapper::GStreamerInput(GStreamerInput::from_url(url)?));
      }
    }
    #[cfg(feature = "frame_directory")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == FrameDirectoryInput::SCHEME {
        return Ok(InputWrapper::FrameDirectory(FrameDirectoryInput::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?));
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

/// 按文档类型拆分后的输入
pub enum Document {
  Image { location: String, image: RgbImage },
  #[cfg(feature = "video")]
  Video(VideoInput),
}

#[cfg(feature = "video")]
pub enum VideoInput {
  #[cfg(feature = "frame_directory")]
  FrameDirectory(FrameDirectoryInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl InputWrapper {
  pub fn location(&self) -> &str {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.location(),
      #[cfg(feature = "frame_directory")]
      InputWrapper::FrameDirectory(input) => input.location(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.location(),
    }
  }

  pub fn is_video(&self) -> bool {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(_) => false,
      #[cfg(feature = "frame_directory")]
      InputWrapper::FrameDirectory(_) => true,
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(_) => true,
    }
  }

  pub fn into_document(self) -> Document {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => {
        let location = input.location().to_string();
        Document::Image {
          location,
          image: input.into_image(),
        }
      }
      #[cfg(feature = "frame_directory")]
      InputWrapper::FrameDirectory(input) => Document::Video(VideoInput::FrameDirectory(input)),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => Document::Video(VideoInput::GStreamerInput(input)),
    }
  }
}

#[cfg(feature = "video")]
impl VideoInput {
  pub fn location(&self) -> &str {
    match self {
      #[cfg(feature = "frame_directory")]
      VideoInput::FrameDirectory(input) => input.location(),
      #[cfg(feature = "gstreamer_input")]
      VideoInput::GStreamerInput(input) => input.location(),
    }
  }
}

#[cfg(feature = "video")]
impl FrameSource for VideoInput {
  type Error = InputError;

  fn frame_count(&self) -> Option<u64> {
    match self {
      #[cfg(feature = "frame_directory")]
      VideoInput::FrameDirectory(input) => input.frame_count(),
      #[cfg(feature = "gstreamer_input")]
      VideoInput::GStreamerInput(input) => input.frame_count(),
    }
  }

  fn frame_rate(&self) -> f64 {
    match self {
      #[cfg(feature = "frame_directory")]
      VideoInput::FrameDirectory(input) => input.frame_rate(),
      #[cfg(feature = "gstreamer_input")]
      VideoInput::GStreamerInput(input) => input.frame_rate(),
    }
  }

  fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error> {
    match self {
      #[cfg(feature = "frame_directory")]
      VideoInput::FrameDirectory(input) => Ok(input.decode_frame(index)?),
      #[cfg(feature = "gstreamer_input")]
      VideoInput::GStreamerInput(input) => Ok(input.decode_frame(index)?),
    }
  }
}
