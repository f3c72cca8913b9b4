// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 文本检测流水线
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

//! # 标注流水线
//!
//! 视频：选帧 -> 逐帧 {推理与解码 -> 抑制 -> 还原坐标 -> 组装} -> 完成。
//! 图像：只处理一次，文本框不带时间点。
//!
//! 状态变化通过 `tracing` 以 `debug` 级别记录，可用 [`Pipeline::state`] 查询。

use std::{
  cell::Cell,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  annotation::{AnnotationView, TextBox},
  config::{ConfigError, Parameters},
  detector::{DetectStage, EastDetector},
  frame::{EastFrame, prepare},
  input::FrameSource,
  merge::{MergeMode, merge_quads},
  model::{EastTensors, InferenceError, InferenceWorker, Model},
  sampler::{FrameSampler, SamplerError, TimeSegment},
  timeunit::TimeUnitError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
  Decode,
  Suppress,
  Rescale,
  Assemble,
}

impl From<DetectStage> for FrameStage {
  fn from(stage: DetectStage) -> Self {
    match stage {
      DetectStage::Decode => FrameStage::Decode,
      DetectStage::Suppress => FrameStage::Suppress,
      DetectStage::Rescale => FrameStage::Rescale,
    }
  }
}

/// 流水线状态，`Done` 与 `Failed` 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Idle,
  SelectingFrames,
  /// 图像文档的 `index` 为 `None`
  PerFrame {
    index: Option<u64>,
    stage: FrameStage,
  },
  Done,
  Failed,
}

/// 帧之间检查的取消标志
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("参数错误: {0}")]
  Config(#[from] ConfigError),
  #[error("选帧错误: {0}")]
  Sampler(#[from] SamplerError),
  #[error("推理不可用: {0}")]
  InferenceUnavailable(#[from] InferenceError),
  #[error("时间换算错误: {0}")]
  TimeUnit(#[from] TimeUnitError),
}

pub struct Pipeline {
  params: Parameters,
  detector: EastDetector,
  worker: InferenceWorker,
  cancel: CancelFlag,
  state: Cell<TaskState>,
}

impl Pipeline {
  /// 校验参数并启动推理线程
  pub fn new<M>(model: M, params: Parameters) -> Result<Self, PipelineError>
  where
    M: Model<Input = EastFrame, Output = EastTensors> + Send + 'static,
    M::Error: std::error::Error + Send + Sync + 'static,
  {
    params.validate()?;
    let worker = InferenceWorker::spawn(model, params.inference_timeout)?;
    Ok(Pipeline {
      detector: EastDetector::new(params.min_confidence, params.overlap_threshold),
      params,
      worker,
      cancel: CancelFlag::default(),
      state: Cell::new(TaskState::Idle),
    })
  }

  pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn cancel_flag(&self) -> CancelFlag {
    self.cancel.clone()
  }

  pub fn parameters(&self) -> &Parameters {
    &self.params
  }

  pub fn state(&self) -> TaskState {
    self.state.get()
  }

  fn transition(&self, next: TaskState) {
    debug!("状态: {:?} -> {:?}", self.state.get(), next);
    self.state.set(next);
  }

  fn finish<T>(&self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
    match &result {
      Ok(_) => self.transition(TaskState::Done),
      Err(e) => {
        error!("流水线失败: {}", e);
        self.transition(TaskState::Failed);
      }
    }
    result
  }

  /// 单张图像的文本框（原图坐标）
  fn detect(&self, image: &RgbImage, index: Option<u64>) -> Result<Vec<TextBox>, PipelineError> {
    self.transition(TaskState::PerFrame {
      index,
      stage: FrameStage::Decode,
    });
    let (frame, ratio) = prepare(image, self.params.denoise);
    let tensors = self.worker.infer(frame)?;
    let boxes = self.detector.detect_with(&tensors, ratio, |stage| {
      self.transition(TaskState::PerFrame {
        index,
        stage: stage.into(),
      })
    });
    self.transition(TaskState::PerFrame {
      index,
      stage: FrameStage::Assemble,
    });
    Ok(boxes)
  }

  /// 只检测，不组装标注
  pub fn detect_image(&self, image: &RgbImage) -> Result<Vec<TextBox>, PipelineError> {
    let result = self.detect(image, None);
    self.finish(result)
  }

  /// 图像文档：文本框不带时间点
  pub fn annotate_image(
    &self,
    image: &RgbImage,
    document: &str,
  ) -> Result<AnnotationView, PipelineError> {
    let result = self.run_image(image, document);
    self.finish(result)
  }

  fn run_image(&self, image: &RgbImage, document: &str) -> Result<AnnotationView, PipelineError> {
    let mut view = AnnotationView::new(document, &self.params);
    let boxes = self.detect(image, None)?;
    info!("图像 {} 检测到 {} 个文本框", document, boxes.len());

    if self.params.merge_boxes {
      self.push_merged(&mut view, &boxes);
    } else {
      for b in &boxes {
        view.push_box(b.corners(), None);
      }
    }
    Ok(view)
  }

  /// 视频文档：按选帧结果逐帧检测
  ///
  /// 帧解码失败或视频提前结束时停止并返回已有结果；取消同理。
  pub fn annotate_video<S: FrameSource>(
    &self,
    source: &mut S,
    segments: &[TimeSegment],
    document: &str,
  ) -> Result<AnnotationView, PipelineError> {
    let result = self.run_video(source, segments, document);
    self.finish(result)
  }

  fn run_video<S: FrameSource>(
    &self,
    source: &mut S,
    segments: &[TimeSegment],
    document: &str,
  ) -> Result<AnnotationView, PipelineError> {
    self.transition(TaskState::SelectingFrames);
    let frame_rate = source.frame_rate();
    // 帧率无效时在推理前失败
    self.params.time_unit.time_of_frame(0, frame_rate)?;
    let selection = FrameSampler::from_parameters(&self.params)?.select(
      segments,
      source.frame_count(),
      frame_rate,
    )?;
    info!(
      "视频 {}: 选中 {} 帧 ({:?})",
      document,
      selection.len(),
      selection.policy()
    );

    let mut view = AnnotationView::new(document, &self.params);
    for &index in &selection {
      if self.cancel.is_cancelled() {
        warn!("任务已取消，停止于第 {} 帧", index);
        break;
      }

      let image = match source.decode_frame(index) {
        Ok(Some(image)) => image,
        Ok(None) => {
          warn!("视频在第 {} 帧之前结束", index);
          break;
        }
        Err(e) => {
          warn!("第 {} 帧解码失败，停止处理: {}", index, e);
          break;
        }
      };

      let now = Instant::now();
      let boxes = self.detect(&image, Some(index))?;
      info!(
        "第 {} 帧: {} 个文本框，耗时 {:.2?}",
        index,
        boxes.len(),
        now.elapsed()
      );
      if boxes.is_empty() {
        continue;
      }

      let time_point = self.params.time_unit.time_of_frame(index, frame_rate)?;
      if self.params.merge_boxes {
        if let Some((merged, originals)) = self.push_merged(&mut view, &boxes) {
          for id in originals.iter().chain(Some(&merged)) {
            self.align(&mut view, time_point, id);
          }
        }
      } else {
        for b in &boxes {
          let id = view.push_box(b.corners(), None);
          self.align(&mut view, time_point, &id);
        }
      }
    }
    Ok(view)
  }

  fn align(&self, view: &mut AnnotationView, time_point: f64, detection_id: &str) {
    let tp = view.push_time_point(self.params.time_unit, time_point);
    view.push_alignment(&tp, detection_id);
  }

  /// 合并为一个外接框，返回合并框与保留的原始框的 id
  ///
  /// `KeepOriginals` 时原始框也写入视图，视频中由调用方为它们对齐同一时间点。
  fn push_merged(
    &self,
    view: &mut AnnotationView,
    boxes: &[TextBox],
  ) -> Option<(String, Vec<String>)> {
    let merged = merge_quads(boxes.iter().map(TextBox::corners))?;
    let originals: Vec<String> = match self.params.merge_mode {
      MergeMode::Replace => Vec::new(),
      MergeMode::KeepOriginals => boxes
        .iter()
        .map(|b| view.push_box(b.corners(), None))
        .collect(),
    };
    debug!("合并 {} 个文本框", boxes.len());
    let merged_from = (!originals.is_empty()).then(|| originals.clone());
    Some((view.push_box(merged, merged_from), originals))
  }
}

#[cfg(test)]
mod tests {
  use std::{convert::Infallible, sync::atomic::AtomicUsize, time::Duration};

  use super::*;
  use crate::{annotation::Quad, model::GEOMETRY_CHANNELS, timeunit::TimeUnit};

  /// 固定在 80x80 特征图的 (10, 20) 与 (30, 40) 单元输出文本
  struct TwoCellModel;

  impl Model for TwoCellModel {
    type Input = EastFrame;
    type Output = EastTensors;
    type Error = Infallible;

    fn infer(&self, _input: &EastFrame) -> Result<EastTensors, Infallible> {
      let (rows, cols) = (80, 80);
      let mut scores = vec![0.0; rows * cols];
      let mut geometry = vec![0.0; GEOMETRY_CHANNELS * rows * cols];
      for (y, x) in [(10, 20), (30, 40)] {
        scores[y * cols + x] = 0.9;
        for c in 0..4 {
          geometry[c * rows * cols + y * cols + x] = 4.0;
        }
      }
      Ok(EastTensors::new(rows, cols, scores, geometry).unwrap())
    }
  }

  struct StillVideo {
    frames: u64,
  }

  impl FrameSource for StillVideo {
    type Error = std::io::Error;

    fn frame_count(&self) -> Option<u64> {
      Some(self.frames)
    }

    fn frame_rate(&self) -> f64 {
      10.0
    }

    fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error> {
      if index >= self.frames {
        return Ok(None);
      }
      Ok(Some(RgbImage::new(320, 320)))
    }
  }

  #[test]
  fn rejects_invalid_parameters() {
    let params = Parameters::default().with_sample_ratio(0);
    assert!(matches!(
      Pipeline::new(TwoCellModel, params),
      Err(PipelineError::Config(ConfigError::NonPositiveSampleRatio(0)))
    ));
  }

  #[test]
  fn image_boxes_have_no_time_points() {
    let pipeline = Pipeline::new(TwoCellModel, Parameters::default()).unwrap();
    let view = pipeline
      .annotate_image(&RgbImage::new(320, 320), "image.png")
      .unwrap();
    assert_eq!(view.detections().count(), 2);
    assert_eq!(view.time_points().count(), 0);
    assert_eq!(view.alignments().count(), 0);
    assert_eq!(pipeline.state(), TaskState::Done);
  }

  #[test]
  fn every_video_box_is_aligned_to_one_time_point() {
    let params = Parameters::default()
      .with_sample_ratio(5)
      .with_time_unit(TimeUnit::Seconds);
    let pipeline = Pipeline::new(TwoCellModel, params).unwrap();
    let view = pipeline
      .annotate_video(&mut StillVideo { frames: 12 }, &[], "video")
      .unwrap();

    // 第 0、5、10 帧各两个框
    assert_eq!(view.detections().count(), 6);
    let times: Vec<f64> = view
      .detections()
      .map(|d| view.time_point_of(&d.id).unwrap().time_point)
      .collect();
    assert_eq!(times, vec![0.0, 0.0, 0.5, 0.5, 1.0, 1.0]);
    assert_eq!(view.alignments().count(), 6);
  }

  #[test]
  fn merge_replaces_boxes_per_frame() {
    let params = Parameters::default()
      .with_sample_ratio(5)
      .with_merge_boxes(true);
    let pipeline = Pipeline::new(TwoCellModel, params).unwrap();
    let view = pipeline
      .annotate_video(&mut StillVideo { frames: 6 }, &[], "video")
      .unwrap();

    let detections: Vec<_> = view.detections().collect();
    assert_eq!(detections.len(), 2);
    // (20,10) 单元: 终点 (84, 44)；(40,30) 单元: 终点 (164, 124)
    assert_eq!(
      detections[0].coordinates,
      Quad([[76, 36], [164, 36], [76, 124], [164, 124]])
    );
    assert_eq!(view.time_point_of(&detections[1].id).unwrap().time_point, 5.0);
  }

  #[test]
  fn keep_originals_records_merge_sources() {
    let params = Parameters::default()
      .with_merge_boxes(true)
      .with_merge_mode(MergeMode::KeepOriginals);
    let pipeline = Pipeline::new(TwoCellModel, params).unwrap();
    let view = pipeline
      .annotate_image(&RgbImage::new(320, 320), "image.png")
      .unwrap();

    let detections: Vec<_> = view.detections().collect();
    assert_eq!(detections.len(), 3);
    assert_eq!(
      detections[2].merged_from,
      Some(vec!["bb1".to_string(), "bb2".to_string()])
    );
  }

  #[test]
  fn kept_originals_share_the_merged_time_point() {
    let params = Parameters::default()
      .with_sample_ratio(5)
      .with_merge_boxes(true)
      .with_merge_mode(MergeMode::KeepOriginals);
    let pipeline = Pipeline::new(TwoCellModel, params).unwrap();
    let view = pipeline
      .annotate_video(&mut StillVideo { frames: 6 }, &[], "video")
      .unwrap();

    // 每帧两个原始框加一个合并框
    assert_eq!(view.detections().count(), 6);
    assert_eq!(view.time_points().count(), 6);
    let frames: Vec<f64> = view
      .detections()
      .map(|d| view.time_point_of(&d.id).unwrap().time_point)
      .collect();
    assert_eq!(frames, vec![0.0, 0.0, 0.0, 5.0, 5.0, 5.0]);
    let merged = view.detections().nth(2).unwrap();
    assert_eq!(
      merged.merged_from,
      Some(vec!["bb1".to_string(), "bb2".to_string()])
    );
  }

  #[test]
  fn invalid_frame_rate_fails_before_inference() {
    struct Counting(Arc<AtomicUsize>);

    impl Model for Counting {
      type Input = EastFrame;
      type Output = EastTensors;
      type Error = Infallible;

      fn infer(&self, input: &EastFrame) -> Result<EastTensors, Infallible> {
        self.0.fetch_add(1, Ordering::SeqCst);
        TwoCellModel.infer(input)
      }
    }

    struct NoRate;

    impl FrameSource for NoRate {
      type Error = std::io::Error;

      fn frame_count(&self) -> Option<u64> {
        Some(10)
      }

      fn frame_rate(&self) -> f64 {
        0.0
      }

      fn decode_frame(&mut self, _index: u64) -> Result<Option<RgbImage>, Self::Error> {
        Ok(Some(RgbImage::new(320, 320)))
      }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let params = Parameters::default().with_time_unit(TimeUnit::Seconds);
    let pipeline = Pipeline::new(Counting(calls.clone()), params).unwrap();
    assert!(matches!(
      pipeline.annotate_video(&mut NoRate, &[], "video"),
      Err(PipelineError::TimeUnit(TimeUnitError::InvalidFrameRate(_)))
    ));
    assert_eq!(pipeline.state(), TaskState::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // 帧序号单位不需要帧率
    let pipeline = Pipeline::new(Counting(calls.clone()), Parameters::default()).unwrap();
    assert!(pipeline.annotate_video(&mut NoRate, &[], "video").is_ok());
    assert!(calls.load(Ordering::SeqCst) > 0);
  }

  #[test]
  fn cancelled_run_returns_partial_view() {
    let cancel = CancelFlag::default();
    cancel.cancel();
    let pipeline = Pipeline::new(TwoCellModel, Parameters::default())
      .unwrap()
      .with_cancel_flag(cancel);
    let view = pipeline
      .annotate_video(&mut StillVideo { frames: 100 }, &[], "video")
      .unwrap();
    assert!(view.is_empty());
    assert_eq!(pipeline.state(), TaskState::Done);
  }

  #[test]
  fn short_video_stops_early() {
    struct Truncated;

    impl FrameSource for Truncated {
      type Error = std::io::Error;

      fn frame_count(&self) -> Option<u64> {
        Some(100)
      }

      fn frame_rate(&self) -> f64 {
        30.0
      }

      fn decode_frame(&mut self, index: u64) -> Result<Option<RgbImage>, Self::Error> {
        if index < 30 {
          Ok(Some(RgbImage::new(64, 64)))
        } else {
          Err(std::io::Error::other("corrupt"))
        }
      }
    }

    let pipeline = Pipeline::new(TwoCellModel, Parameters::default()).unwrap();
    let view = pipeline.annotate_video(&mut Truncated, &[], "video").unwrap();
    // 只有第 0 帧可读
    let frames: Vec<f64> = view.time_points().map(|t| t.time_point).collect();
    assert_eq!(frames, vec![0.0, 0.0]);
  }

  #[test]
  fn inference_timeout_fails_the_run() {
    struct Stuck;

    impl Model for Stuck {
      type Input = EastFrame;
      type Output = EastTensors;
      type Error = Infallible;

      fn infer(&self, _input: &EastFrame) -> Result<EastTensors, Infallible> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(EastTensors::new(1, 1, vec![0.0], vec![0.0; GEOMETRY_CHANNELS]).unwrap())
      }
    }

    let params = Parameters::default().with_inference_timeout(Some(Duration::from_millis(20)));
    let pipeline = Pipeline::new(Stuck, params).unwrap();
    assert!(matches!(
      pipeline.detect_image(&RgbImage::new(32, 32)),
      Err(PipelineError::InferenceUnavailable(InferenceError::Timeout(_)))
    ));
    assert_eq!(pipeline.state(), TaskState::Failed);
  }
}
