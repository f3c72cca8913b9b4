// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/east_onnx.rs - 基于 ONNX Runtime 的 EAST 文本检测模型
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

use std::sync::Mutex;

use ndarray::Array4;
use ort::{session::Session, value::TensorRef};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path,
  frame::{EAST_INPUT_H, EAST_INPUT_W, EastFrame},
  input::AsNhwcFrame,
  model::{EastTensors, GEOMETRY_CHANNELS, Model, ShapeError},
};

/// 训练时使用的 RGB 均值
const EAST_MEAN_RGB: [f32; 3] = [123.68, 116.78, 103.94];

#[derive(Error, Debug)]
pub enum EastOnnxError {
  #[error("模型路径必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型会话锁已损坏")]
  SessionPoisoned,
  #[error("模型缺少输入")]
  MissingInput,
  #[error("模型输出数量错误: 期望 2, 实际 {0}")]
  OutputCount(usize),
  #[error("输出形状错误: {0}")]
  Shape(#[from] ShapeError),
  #[error("张量形状错误: {0}")]
  Ndarray(#[from] ndarray::ShapeError),
}

pub struct EastOnnxBuilder {
  model_path: String,
}

impl FromUrl for EastOnnxBuilder {
  type Error = EastOnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EastOnnxError::SchemeMismatch(Self::SCHEME));
    }
    Ok(EastOnnxBuilder {
      model_path: decoded_path(url),
    })
  }
}

impl FromUrlWithScheme for EastOnnxBuilder {
  const SCHEME: &'static str = "east";
}

impl EastOnnxBuilder {
  pub fn build(self) -> Result<EastOnnx, EastOnnxError> {
    info!("加载 EAST 模型: {}", self.model_path);
    let session = Session::builder().and_then(|b| b.commit_from_file(&self.model_path))?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or(EastOnnxError::MissingInput)?;
    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    if output_names.len() != 2 {
      return Err(EastOnnxError::OutputCount(output_names.len()));
    }
    debug!("模型输入: {}, 输出: {:?}", input_name, output_names);
    info!("模型加载完成");

    Ok(EastOnnx {
      session: Mutex::new(session),
      input_name,
      output_names,
    })
  }
}

pub struct EastOnnx {
  session: Mutex<Session>,
  input_name: String,
  output_names: Vec<String>,
}

/// 单个输出张量的布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
  Nchw,
  Nhwc,
}

/// 按通道数识别输出: 1 为分数，5 为几何
fn classify(shape: &[i64]) -> Result<(usize, Layout, usize, usize), ShapeError> {
  let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
  match dims.as_slice() {
    [1, c, r, w] if *c == 1 || *c == GEOMETRY_CHANNELS => Ok((*c, Layout::Nchw, *r, *w)),
    [1, r, w, c] if *c == 1 || *c == GEOMETRY_CHANNELS => Ok((*c, Layout::Nhwc, *r, *w)),
    _ => Err(ShapeError::Layout(shape.to_vec())),
  }
}

impl EastOnnx {
  fn input_tensor(&self, frame: &EastFrame) -> Result<Array4<f32>, EastOnnxError> {
    let data: Vec<f32> = frame
      .as_nhwc()
      .iter()
      .enumerate()
      .map(|(i, &v)| f32::from(v) - EAST_MEAN_RGB[i % 3])
      .collect();
    Ok(Array4::from_shape_vec(
      (1, EAST_INPUT_H as usize, EAST_INPUT_W as usize, 3),
      data,
    )?)
  }
}

impl Model for EastOnnx {
  type Input = EastFrame;
  type Output = EastTensors;
  type Error = EastOnnxError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.input_tensor(input)?;
    let input_tensor = TensorRef::from_array_view(tensor.view())?;
    let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

    let mut session = self
      .session
      .lock()
      .map_err(|_| EastOnnxError::SessionPoisoned)?;
    let outputs = session.run(inputs)?;

    let mut scores = None;
    let mut geometry = None;
    for name in &self.output_names {
      let (shape, data) = outputs[name.as_str()].try_extract_tensor::<f32>()?;
      let (channels, layout, rows, cols) = classify(shape)?;
      debug!(
        "输出 {}: {:?} 通道 {} 尺寸 {}x{}",
        name, layout, channels, rows, cols
      );
      if channels == 1 {
        scores = Some((rows, cols, data.to_vec()));
      } else {
        geometry = Some((layout, data.to_vec()));
      }
    }

    match (scores, geometry) {
      (Some((rows, cols, scores)), Some((Layout::Nchw, geometry))) => {
        Ok(EastTensors::new(rows, cols, scores, geometry)?)
      }
      (Some((rows, cols, scores)), Some((Layout::Nhwc, geometry))) => {
        Ok(EastTensors::from_nhwc(rows, cols, scores, &geometry)?)
      }
      _ => Err(EastOnnxError::OutputCount(self.output_names.len())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_checks_scheme() {
    let url = Url::parse("east:///models/frozen%20east.onnx").unwrap();
    let builder = EastOnnxBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/frozen east.onnx");

    let url = Url::parse("yolo:///models/a.onnx").unwrap();
    assert!(matches!(
      EastOnnxBuilder::from_url(&url),
      Err(EastOnnxError::SchemeMismatch("east"))
    ));
  }

  #[test]
  fn output_layouts_are_recognised() {
    assert_eq!(
      classify(&[1, 5, 80, 80]).unwrap(),
      (5, Layout::Nchw, 80, 80)
    );
    assert_eq!(
      classify(&[1, 80, 80, 1]).unwrap(),
      (1, Layout::Nhwc, 80, 80)
    );
    assert!(classify(&[1, 3, 80, 80]).is_err());
  }
}
