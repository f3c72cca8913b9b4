// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 按日期归档的目录记录输出
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

//! 每次渲染在 `folder:///dir` 下写入 `YYYY/MM/DD/HH-MM-SS-XXXX.json`。
//!
//! 查询参数：
//! - `always`：视图为空时也写入
//! - `draw`：图像文档额外保存一张同名的标注 PNG

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  annotation::AnnotationView,
  decoded_path,
  input::Document,
  output::{
    JsonFileOutputError, Render,
    draw::Draw,
    json_file::write_json,
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 输出错误: {0}")]
  JsonError(#[from] JsonFileOutputError),
  #[error("记录计数器锁已损坏")]
  CounterPoisoned,
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Option<Draw>,
  record_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let draw = uri
      .query_pairs()
      .any(|(k, _)| k == "draw")
      .then(Draw::default);

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(decoded_path(uri)),
      draw,
      record_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn record_id(&self) -> Result<u16, DirectoryRecordOutputError> {
    let mut counter = self
      .record_counter
      .lock()
      .map_err(|_| DirectoryRecordOutputError::CounterPoisoned)?;
    let id = counter.wrapping_add(1);
    *counter = id;
    Ok(id)
  }

  /// 不带扩展名的记录路径
  fn record_stem(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}",
      now.format("%H-%M-%S"),
      self.record_id()?
    )))
  }
}

impl Render<Document, AnnotationView> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, source: &Document, result: &AnnotationView) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("视图为空，跳过记录");
      return Ok(());
    }

    let stem = self.record_stem()?;
    write_json(&stem.with_extension("json"), result)?;

    if let (Some(draw), Document::Image { image, .. }) = (&self.draw, source) {
      draw.draw_view(image, result).save(stem.with_extension("png"))?;
    }
    debug!("记录已写入: {}", stem.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;
  use crate::{annotation::Quad, config::Parameters};

  fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
      for entry in std::fs::read_dir(&current).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          pending.push(path);
        } else {
          files.push(path);
        }
      }
    }
    files.sort();
    files
  }

  fn image_document() -> Document {
    Document::Image {
      location: "in.png".to_string(),
      image: RgbImage::new(8, 8),
    }
  }

  #[test]
  fn empty_views_are_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let view = AnnotationView::new("in.png", &Parameters::default());

    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&image_document(), &view).unwrap();
    assert!(files_under(dir.path()).is_empty());

    let url = url::Url::parse(&format!("folder://{}?always", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&image_document(), &view).unwrap();
    let files = files_under(dir.path());
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().ends_with("-0001.json"));
  }

  #[test]
  fn draw_query_also_saves_png() {
    let dir = tempfile::tempdir().unwrap();
    let mut view = AnnotationView::new("in.png", &Parameters::default());
    view.push_box(Quad([[1, 1], [5, 1], [1, 5], [5, 5]]), None);

    let url = url::Url::parse(&format!("folder://{}?draw", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&image_document(), &view).unwrap();
    output.render_result(&image_document(), &view).unwrap();

    let files = files_under(dir.path());
    let json = files.iter().filter(|p| p.extension().is_some_and(|e| e == "json"));
    let png = files.iter().filter(|p| p.extension().is_some_and(|e| e == "png"));
    assert_eq!(json.count(), 2);
    assert_eq!(png.count(), 2);
  }
}
