// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 模型输入帧与预处理
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;

use crate::input::AsNhwcFrame;

const RGB_CHANNELS: usize = 3;

/// EAST 模型的固定输入尺寸（32 的倍数）
pub const EAST_INPUT_W: u32 = 320;
pub const EAST_INPUT_H: u32 = 320;

/// 中值滤波半径，对应 5x5 核
pub const DENOISE_RADIUS: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

pub type EastFrame = RgbNhwcFrame<EAST_INPUT_W, EAST_INPUT_H>;

impl<const W: u32, const H: u32> TryFrom<Vec<u8>> for RgbNhwcFrame<W, H> {
  type Error = FrameError;

  fn try_from(data: Vec<u8>) -> Result<Self, Self::Error> {
    let expected = RGB_CHANNELS * W as usize * H as usize;
    if data.len() != expected {
      return Err(FrameError::SizeMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbNhwcFrame<W, H> {
  fn default() -> Self {
    let size = RGB_CHANNELS * (W as usize) * (H as usize);
    Self {
      data: vec![0u8; size].into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 读取 (x, y) 处的 RGB 像素
  pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
    let base = (y * W as usize + x) * RGB_CHANNELS;
    [self.data[base], self.data[base + 1], self.data[base + 2]]
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame<W, H> for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

/// 原图与模型输入之间的缩放比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRatio {
  pub rw: f64,
  pub rh: f64,
}

impl ScaleRatio {
  pub fn of_source(width: u32, height: u32) -> Self {
    Self {
      rw: f64::from(width) / f64::from(EAST_INPUT_W),
      rh: f64::from(height) / f64::from(EAST_INPUT_H),
    }
  }
}

/// 将原图缩放到 320x320 模型输入，不保持宽高比
///
/// 缩放比例在缩放之前根据原图尺寸计算。`denoise` 为真时先做中值滤波。
pub fn prepare(image: &RgbImage, denoise: bool) -> (EastFrame, ScaleRatio) {
  let ratio = ScaleRatio::of_source(image.width(), image.height());

  let resized = if denoise {
    let filtered = imageproc::filter::median_filter(image, DENOISE_RADIUS, DENOISE_RADIUS);
    image::imageops::resize(&filtered, EAST_INPUT_W, EAST_INPUT_H, FilterType::Triangle)
  } else {
    image::imageops::resize(image, EAST_INPUT_W, EAST_INPUT_H, FilterType::Triangle)
  };

  let frame = EastFrame {
    data: resized.into_raw().into_boxed_slice(),
  };
  (frame, ratio)
}
