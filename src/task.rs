// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务定义
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

use std::{thread, time::Duration};

use tracing::{info, warn};

use crate::{
  annotation::AnnotationView,
  config::Parameters,
  frame::EastFrame,
  input::{Document, InputWrapper},
  model::{EastTensors, Model},
  output::Render,
  pipeline::{CancelFlag, Pipeline},
  sampler::TimeSegment,
};

/// 收到中断信号后等待任务自行退出的时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 读取一个文档，检测文本并输出标注视图
#[derive(Debug, Default)]
pub struct AnnotateTask {
  params: Parameters,
  segments: Vec<TimeSegment>,
  cancel: CancelFlag,
}

impl AnnotateTask {
  pub fn new(params: Parameters) -> Self {
    Self {
      params,
      ..Default::default()
    }
  }

  /// 外部提供的时间片段，为空时均匀取样
  pub fn with_segments(mut self, segments: Vec<TimeSegment>) -> Self {
    self.segments = segments;
    self
  }

  pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
    self.cancel = cancel;
    self
  }

  /// Ctrl-C 时在帧之间停止，超时未退出则强制结束进程
  pub fn with_interrupt_handler(self) -> anyhow::Result<Self> {
    let cancel = self.cancel.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      cancel.cancel();
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .map_err(|e| anyhow::anyhow!("无法设置 Ctrl-C 处理函数: {}", e))?;
    Ok(self)
  }
}

impl<M, ME, O, RE> Task<InputWrapper, M, O> for AnnotateTask
where
  M: Model<Input = EastFrame, Output = EastTensors, Error = ME> + Send + 'static,
  ME: std::error::Error + Send + Sync + 'static,
  O: Render<Document, AnnotationView, Error = RE>,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: InputWrapper, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let pipeline = Pipeline::new(model, self.params)?.with_cancel_flag(self.cancel);

    let now = std::time::Instant::now();
    let mut document = input.into_document();
    let view = match &mut document {
      Document::Image { location, image } => pipeline.annotate_image(image, location)?,
      #[cfg(feature = "video")]
      Document::Video(video) => {
        let location = video.location().to_string();
        pipeline.annotate_video(video, &self.segments, &location)?
      }
    };
    info!(
      "检测完成，共 {} 个文本框，耗时: {:.2?}",
      view.detections().count(),
      now.elapsed()
    );

    output.render_result(&document, &view)?;
    info!("输出完成");
    Ok(())
  }
}

#[cfg(all(test, feature = "read_image_file"))]
mod tests {
  use std::convert::Infallible;

  use super::*;
  use crate::{FromUrl, model::GEOMETRY_CHANNELS, output::JsonFileOutput};

  struct OneCellModel;

  impl Model for OneCellModel {
    type Input = EastFrame;
    type Output = EastTensors;
    type Error = Infallible;

    fn infer(&self, _input: &EastFrame) -> Result<EastTensors, Infallible> {
      let mut geometry = vec![1.0; 4];
      geometry.push(0.0);
      Ok(EastTensors::new(1, 1, vec![0.5], geometry).unwrap())
    }
  }

  #[test]
  fn annotates_image_into_json() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("in.png");
    image::RgbImage::new(640, 320).save(&image_path).unwrap();
    let json_path = dir.path().join("view.json");

    let url = url::Url::parse(&format!("image://{}", image_path.display())).unwrap();
    let input = InputWrapper::from_url(&url).unwrap();
    AnnotateTask::new(Parameters::default())
      .run_task(input, OneCellModel, JsonFileOutput::to_path(&json_path))
      .unwrap();

    let value: serde_json::Value =
      serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    let annotations = value["annotations"].as_array().unwrap();
    assert_eq!(annotations.len(), 1);
    // 单元 (0,0): 终点 (1,1)，起点 (-1,-1)，横向放大 2 倍
    assert_eq!(
      annotations[0]["properties"]["coordinates"],
      serde_json::json!([[-2, -1], [2, -1], [-2, 1], [2, 1]])
    );
  }
}
