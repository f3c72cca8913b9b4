// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型接口、EAST 输出张量与推理线程
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
  cell::Cell,
  sync::mpsc::{self, RecvTimeoutError},
  thread::{self, JoinHandle},
  time::Duration,
};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::frame::EastFrame;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// geometry 张量的通道数: 上、右、下、左距离与角度
pub const GEOMETRY_CHANNELS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
  #[error("分数张量长度错误: 期望 {expected}, 实际 {actual}")]
  Scores { expected: usize, actual: usize },
  #[error("几何张量长度错误: 期望 {expected}, 实际 {actual}")]
  Geometry { expected: usize, actual: usize },
  #[error("无法识别的输出形状: {0:?}")]
  Layout(Vec<i64>),
}

/// EAST 模型一次推理的原始输出
///
/// `scores` 为 `[1, 1, R, C]`，`geometry` 为 `[1, 5, R, C]`，均按行优先存储。
#[derive(Debug, Clone)]
pub struct EastTensors {
  rows: usize,
  cols: usize,
  scores: Box<[f32]>,
  geometry: Box<[f32]>,
}

impl EastTensors {
  pub fn new(
    rows: usize,
    cols: usize,
    scores: Vec<f32>,
    geometry: Vec<f32>,
  ) -> Result<Self, ShapeError> {
    let plane = rows * cols;
    if scores.len() != plane {
      return Err(ShapeError::Scores {
        expected: plane,
        actual: scores.len(),
      });
    }
    if geometry.len() != GEOMETRY_CHANNELS * plane {
      return Err(ShapeError::Geometry {
        expected: GEOMETRY_CHANNELS * plane,
        actual: geometry.len(),
      });
    }
    Ok(Self {
      rows,
      cols,
      scores: scores.into_boxed_slice(),
      geometry: geometry.into_boxed_slice(),
    })
  }

  /// 从 NHWC 布局（`[1, R, C, 1]` 与 `[1, R, C, 5]`）转换
  pub fn from_nhwc(
    rows: usize,
    cols: usize,
    scores: Vec<f32>,
    geometry_nhwc: &[f32],
  ) -> Result<Self, ShapeError> {
    let plane = rows * cols;
    if geometry_nhwc.len() != GEOMETRY_CHANNELS * plane {
      return Err(ShapeError::Geometry {
        expected: GEOMETRY_CHANNELS * plane,
        actual: geometry_nhwc.len(),
      });
    }
    let mut geometry = vec![0f32; GEOMETRY_CHANNELS * plane];
    for (cell, values) in geometry_nhwc.chunks_exact(GEOMETRY_CHANNELS).enumerate() {
      for (c, v) in values.iter().enumerate() {
        geometry[c * plane + cell] = *v;
      }
    }
    Self::new(rows, cols, scores, geometry)
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  pub fn score(&self, y: usize, x: usize) -> f32 {
    self.scores[y * self.cols + x]
  }

  pub fn geometry(&self, channel: usize, y: usize, x: usize) -> f32 {
    self.geometry[(channel * self.rows + y) * self.cols + x]
  }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type Job = (EastFrame, mpsc::Sender<Result<EastTensors, BoxError>>);

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("模型推理失败: {0}")]
  Model(BoxError),
  #[error("推理超时: {0:?}")]
  Timeout(Duration),
  #[error("推理线程已退出")]
  WorkerGone,
  #[error("无法启动推理线程: {0}")]
  Spawn(std::io::Error),
  #[error("模型输出形状错误: {0}")]
  Shape(#[from] ShapeError),
}

/// 独占模型的推理线程
///
/// 每次推理通过通道发送给线程，调用方按 `timeout` 等待结果。
/// 超时后线程被视为卡死，析构时不再等待它退出。
pub struct InferenceWorker {
  sender: Option<mpsc::Sender<Job>>,
  handle: Option<JoinHandle<()>>,
  timeout: Option<Duration>,
  stalled: Cell<bool>,
}

impl InferenceWorker {
  pub fn spawn<M>(model: M, timeout: Option<Duration>) -> Result<Self, InferenceError>
  where
    M: Model<Input = EastFrame, Output = EastTensors> + Send + 'static,
    M::Error: std::error::Error + Send + Sync + 'static,
  {
    let (sender, receiver) = mpsc::channel::<Job>();
    let handle = thread::Builder::new()
      .name("east-inference".to_string())
      .spawn(move || {
        for (frame, reply) in receiver {
          let result = model.infer(&frame).map_err(|e| Box::new(e) as BoxError);
          if reply.send(result).is_err() {
            debug!("推理结果无人接收");
          }
        }
        debug!("推理线程退出");
      })
      .map_err(InferenceError::Spawn)?;

    Ok(Self {
      sender: Some(sender),
      handle: Some(handle),
      timeout,
      stalled: Cell::new(false),
    })
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  pub fn infer(&self, frame: EastFrame) -> Result<EastTensors, InferenceError> {
    if self.stalled.get() {
      return Err(InferenceError::WorkerGone);
    }
    let sender = self.sender.as_ref().ok_or(InferenceError::WorkerGone)?;
    let (reply, result) = mpsc::channel();
    sender
      .send((frame, reply))
      .map_err(|_| InferenceError::WorkerGone)?;

    let outcome = match self.timeout {
      Some(timeout) => result.recv_timeout(timeout).map_err(|e| match e {
        RecvTimeoutError::Timeout => {
          error!("推理超过 {:?} 未返回", timeout);
          self.stalled.set(true);
          InferenceError::Timeout(timeout)
        }
        RecvTimeoutError::Disconnected => InferenceError::WorkerGone,
      })?,
      None => result.recv().map_err(|_| InferenceError::WorkerGone)?,
    };
    outcome.map_err(InferenceError::Model)
  }
}

impl Drop for InferenceWorker {
  fn drop(&mut self) {
    drop(self.sender.take());
    if let Some(handle) = self.handle.take() {
      if self.stalled.get() {
        warn!("推理线程未响应，放弃等待");
        return;
      }
      if handle.join().is_err() {
        error!("推理线程异常退出");
      }
    }
  }
}

#[cfg(feature = "model_east_onnx")]
mod east_onnx;
#[cfg(feature = "model_east_onnx")]
pub use self::east_onnx::{EastOnnx, EastOnnxBuilder, EastOnnxError};
