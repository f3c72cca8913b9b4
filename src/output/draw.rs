// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 文本框可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::annotation::{AnnotationView, Quad};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i32 = 2;

pub struct Draw {
  color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  /// 在图像副本上绘制视图中的全部文本框
  pub fn draw_view(&self, image: &RgbImage, view: &AnnotationView) -> RgbImage {
    let mut canvas = image.clone();
    for detection in view.detections() {
      self.draw_quad(&mut canvas, &detection.coordinates);
    }
    canvas
  }

  fn draw_quad(&self, image: &mut RgbImage, quad: &Quad) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }
    let (w, h) = (image.width() as i32, image.height() as i32);

    let x_min = quad.top_left()[0].min(quad.bottom_left()[0]).clamp(0, w - 1);
    let y_min = quad.top_left()[1].min(quad.top_right()[1]).clamp(0, h - 1);
    let x_max = quad.top_right()[0].max(quad.bottom_right()[0]).clamp(0, w - 1);
    let y_max = quad.bottom_left()[1].max(quad.bottom_right()[1]).clamp(0, h - 1);

    // 向内逐层加粗
    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }
}
