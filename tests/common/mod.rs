// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/common/mod.rs - 集成测试公用的模拟视频与模型
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

#![allow(dead_code)]

use std::convert::Infallible;

use image::{Rgb, RgbImage};
use shanan_east::{
  detector::EAST_STRIDE,
  frame::{EAST_INPUT_H, EAST_INPUT_W, EastFrame},
  input::FrameSource,
  model::{EastTensors, GEOMETRY_CHANNELS, Model},
};

pub const VIDEO_W: u32 = 160;
pub const VIDEO_H: u32 = 120;
pub const VIDEO_FRAMES: u64 = 90;
pub const VIDEO_FPS: f64 = 30.0;
/// 文字区域出现的帧（含两端）
pub const TEXT_FRAMES: std::ops::RangeInclusive<u64> = 15..=45;
/// 文字区域 `(x0, y0, x1, y1)`，不含右下边界
pub const TEXT_RECT: (u32, u32, u32, u32) = (40, 50, 120, 70);

const BACKGROUND: u8 = 128;
/// 单元内亮度极差超过该值视为文字
const CONTRAST_THRESHOLD: u8 = 64;

/// 灰色背景，`with_text` 时在 [`TEXT_RECT`] 内画黑白竖条纹
pub fn synthetic_frame(with_text: bool) -> RgbImage {
  let (x0, y0, x1, y1) = TEXT_RECT;
  RgbImage::from_fn(VIDEO_W, VIDEO_H, |x, y| {
    let inside = with_text && (x0..x1).contains(&x) && (y0..y1).contains(&y);
    let v = match inside {
      true if x % 2 == 0 => 0,
      true => 255,
      false => BACKGROUND,
    };
    Rgb([v, v, v])
  })
}

/// 内存中的视频，帧序号即下标
pub struct MemoryVideo {
  frames: Vec<RgbImage>,
  frame_rate: f64,
}

impl MemoryVideo {
  pub fn new(frames: Vec<RgbImage>, frame_rate: f64) -> Self {
    Self { frames, frame_rate }
  }

  /// 3 秒 30 fps，第 15 到 45 帧有文字
  pub fn with_text_in_the_middle() -> Self {
    let frames = (0..VIDEO_FRAMES)
      .map(|i| synthetic_frame(TEXT_FRAMES.contains(&i)))
      .collect();
    Self::new(frames, VIDEO_FPS)
  }
}

impl FrameSource for MemoryVideo {
  type Error = Infallible;

  fn frame_count(&self) -> Option<u64> {
    Some(self.frames.len() as u64)
  }

  fn frame_rate(&self) -> f64 {
    self.frame_rate
  }

  fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error> {
    Ok(usize::try_from(index).ok().and_then(|i| self.frames.get(i)).cloned())
  }
}

/// 以局部对比度代替神经网络的模型
///
/// 4x4 单元内亮度极差大于阈值即为文字单元，分数 0.9；
/// 所有文字单元的几何量都指向全部文字单元的外接区域，角度为 0。
pub struct ContrastModel;

impl ContrastModel {
  fn cell_is_text(frame: &EastFrame, cx: usize, cy: usize) -> bool {
    let stride = EAST_STRIDE as usize;
    let (mut lo, mut hi) = (u8::MAX, u8::MIN);
    for y in cy * stride..(cy + 1) * stride {
      for x in cx * stride..(cx + 1) * stride {
        let [r, g, b] = frame.pixel(x, y);
        let luma = ((u16::from(r) + u16::from(g) + u16::from(b)) / 3) as u8;
        lo = lo.min(luma);
        hi = hi.max(luma);
      }
    }
    hi - lo > CONTRAST_THRESHOLD
  }
}

impl Model for ContrastModel {
  type Input = EastFrame;
  type Output = EastTensors;
  type Error = Infallible;

  fn infer(&self, frame: &EastFrame) -> Result<EastTensors, Infallible> {
    let stride = EAST_STRIDE as usize;
    let rows = EAST_INPUT_H as usize / stride;
    let cols = EAST_INPUT_W as usize / stride;
    let plane = rows * cols;

    let active: Vec<(usize, usize)> = (0..rows)
      .flat_map(|cy| (0..cols).map(move |cx| (cy, cx)))
      .filter(|&(cy, cx)| Self::cell_is_text(frame, cx, cy))
      .collect();

    let mut scores = vec![0.0f32; plane];
    let mut geometry = vec![0.0f32; GEOMETRY_CHANNELS * plane];
    if let (Some(top), Some(bottom), Some(left), Some(right)) = (
      active.iter().map(|a| a.0).min(),
      active.iter().map(|a| a.0).max(),
      active.iter().map(|a| a.1).min(),
      active.iter().map(|a| a.1).max(),
    ) {
      let (top, left) = ((top * stride) as f32, (left * stride) as f32);
      let bottom = (bottom * stride + stride - 1) as f32;
      let right = (right * stride + stride - 1) as f32;
      for &(cy, cx) in &active {
        let cell = cy * cols + cx;
        let (ox, oy) = ((cx * stride) as f32, (cy * stride) as f32);
        scores[cell] = 0.9;
        geometry[cell] = oy - top;
        geometry[plane + cell] = right - ox;
        geometry[2 * plane + cell] = bottom - oy;
        geometry[3 * plane + cell] = ox - left;
      }
    }

    Ok(EastTensors::new(rows, cols, scores, geometry).unwrap())
  }
}
