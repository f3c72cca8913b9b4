// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/json_file.rs - 标注视图 JSON 输出
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, annotation::AnnotationView, decoded_path, input::Document,
  output::Render,
};

/// 路径为 `-` 时写到标准输出
const STDOUT_PATH: &str = "-";

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
  Stdout,
  File(PathBuf),
}

pub struct JsonFileOutput {
  target: Target,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(uri.scheme().to_string()));
    }
    let path = decoded_path(uri);
    let target = if path == STDOUT_PATH || path.is_empty() {
      Target::Stdout
    } else {
      Target::File(PathBuf::from(path))
    };
    Ok(JsonFileOutput { target })
  }
}

impl JsonFileOutput {
  pub fn to_path(path: impl AsRef<Path>) -> Self {
    JsonFileOutput {
      target: Target::File(path.as_ref().to_path_buf()),
    }
  }

  pub fn write_view(&self, view: &AnnotationView) -> Result<(), JsonFileOutputError> {
    match &self.target {
      Target::Stdout => {
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        serde_json::to_writer_pretty(&mut writer, view)?;
        writeln!(writer)?;
      }
      Target::File(path) => {
        write_json(path, view)?;
        info!("标注视图已写入: {}", path.display());
      }
    }
    Ok(())
  }
}

/// 写入 JSON 文件，必要时创建父目录
pub(crate) fn write_json(path: &Path, view: &AnnotationView) -> Result<(), JsonFileOutputError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  let mut writer = BufWriter::new(File::create(path)?);
  serde_json::to_writer_pretty(&mut writer, view)?;
  writer.flush()?;
  Ok(())
}

impl Render<Document, AnnotationView> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, _source: &Document, result: &AnnotationView) -> Result<(), Self::Error> {
    self.write_view(result)
  }
}
