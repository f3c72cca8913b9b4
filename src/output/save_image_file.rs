// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的图像文件
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

use std::path::Path;

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  annotation::AnnotationView,
  decoded_path,
  input::Document,
  output::{Render, draw::Draw},
};

pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: decoded_path(uri),
      draw: Draw::default(),
    })
  }
}

impl SaveImageFileOutput {
  pub(crate) fn save_image(path: &Path, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    image.save(path)?;
    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

impl Render<Document, AnnotationView> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, source: &Document, result: &AnnotationView) -> Result<(), Self::Error> {
    match source {
      Document::Image { image, .. } => {
        let canvas = self.draw.draw_view(image, result);
        Self::save_image(Path::new(&self.path), &canvas)
      }
      #[cfg(feature = "video")]
      Document::Video(video) => {
        tracing::warn!("视频文档 {} 不支持保存为图像，跳过", video.location());
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{annotation::Quad, config::Parameters};

  #[test]
  fn saves_drawn_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("boxes.png");
    let output =
      SaveImageFileOutput::from_url(&Url::parse(&format!("image://{}", path.display())).unwrap())
        .unwrap();

    let document = Document::Image {
      location: "in.png".to_string(),
      image: RgbImage::new(16, 16),
    };
    let mut view = AnnotationView::new("in.png", &Parameters::default());
    view.push_box(Quad([[2, 2], [10, 2], [2, 10], [10, 10]]), None);
    output.render_result(&document, &view).unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (16, 16));
    assert_eq!(saved.get_pixel(2, 2).0, [0, 0, 255]);
    assert_eq!(saved.get_pixel(6, 6).0, [0, 0, 0]);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("json:///tmp/out.json").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
