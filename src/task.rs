// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/task.rs - 处理流程与任务循环
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
  sync::mpsc::{Receiver, Sender, channel},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::{
  blur::{BlurConfig, BlurPolicy},
  config::DetectionConfig,
  detect::{Decoder, Detection, suppress},
  frame::Frame,
  input::InputError,
  label::LabelTable,
  model::Model,
  output::{Render, draw::Annotator},
};

/// 单帧处理结果
#[derive(Debug, Clone)]
pub struct FrameReport {
  pub index: u64,
  /// 解码后、抑制前的候选数量
  pub candidates: usize,
  /// 抑制后保留并标注的检测
  pub detections: Vec<Detection>,
  /// 被模糊策略处理的检测框数量
  pub blurred: usize,
  /// 推理调用耗时
  pub inference: Duration,
}

/// 一次迭代: 推理 → 解码 → 抑制 → 模糊 → 标注
///
/// 不在帧之间保存任何检测状态。
pub struct Pipeline {
  labels: LabelTable,
  decoder: Decoder,
  detection: DetectionConfig,
  blur: BlurPolicy,
  annotator: Annotator,
}

impl Pipeline {
  pub fn new(
    labels: LabelTable,
    detection: DetectionConfig,
    blur: BlurConfig,
    annotator: Annotator,
  ) -> Self {
    Self {
      decoder: Decoder::new(labels.len()),
      labels,
      detection,
      blur: BlurPolicy::new(blur),
      annotator,
    }
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn process<M>(&self, model: &M, frame: &mut Frame) -> anyhow::Result<FrameReport>
  where
    M: Model,
    M::Error: std::error::Error + Send + Sync + 'static,
  {
    let started = Instant::now();
    let outputs = model
      .infer(&frame.image)
      .with_context(|| format!("第 {} 帧推理失败", frame.index))?;
    let inference = started.elapsed();

    let candidates = self
      .decoder
      .decode(
        &outputs,
        frame.width(),
        frame.height(),
        self.detection.confidence_threshold(),
      )
      .with_context(|| format!("第 {} 帧模型输出无法解码", frame.index))?;
    let candidate_count = candidates.len();

    let detections = suppress(
      candidates,
      self.detection.confidence_threshold(),
      self.detection.overlap_threshold(),
    );
    debug!(
      "第 {} 帧: 候选 {} 个, 抑制后 {} 个",
      frame.index,
      candidate_count,
      detections.len()
    );

    let blurred = self.blur.apply(&mut frame.image, &detections, &self.labels);
    self
      .annotator
      .annotate(&mut frame.image, &detections, &self.labels);

    Ok(FrameReport {
      index: frame.index,
      candidates: candidate_count,
      detections,
      blurred,
      inference,
    })
  }
}

/// 停止信号，在每次迭代开始前检查
pub struct StopSignal {
  receiver: Receiver<()>,
}

impl StopSignal {
  /// 安装 Ctrl-C 处理函数；30 秒内未退出则强制结束进程
  pub fn ctrlc() -> Result<Self, ctrlc::Error> {
    let (tx, rx) = channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Self { receiver: rx })
  }

  pub fn manual() -> (Sender<()>, Self) {
    let (tx, rx) = channel();
    (tx, Self { receiver: rx })
  }

  pub fn is_raised(&self) -> bool {
    self.receiver.try_recv().is_ok()
  }
}

/// 运行统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
  pub frames: u64,
  pub detections: usize,
  pub blurred: usize,
  pub inference_total: Duration,
}

impl RunStats {
  fn record(&mut self, report: &FrameReport) {
    self.frames += 1;
    self.detections += report.detections.len();
    self.blurred += report.blurred;
    self.inference_total += report.inference;
  }

  pub fn mean_inference(&self) -> Option<Duration> {
    u32::try_from(self.frames)
      .ok()
      .filter(|&frames| frames > 0)
      .map(|frames| self.inference_total / frames)
  }
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<RunStats, Self::Error>;
}

/// 持续处理输入直到流结束、达到帧数上限或收到停止信号
pub struct ContinuousTask {
  pipeline: Pipeline,
  stop: StopSignal,
  frame_number: Option<u64>,
}

impl ContinuousTask {
  pub fn new(pipeline: Pipeline, stop: StopSignal) -> Self {
    Self {
      pipeline,
      stop,
      frame_number: None,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<I, M, O> Task<I, M, O> for ContinuousTask
where
  I: Iterator<Item = Result<Frame, InputError>>,
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<RunStats, Self::Error> {
    info!("开始任务...");
    let mut stats = RunStats::default();

    loop {
      if self.stop.is_raised() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      if self.frame_number.is_some_and(|n| stats.frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", stats.frames);
        break;
      }

      let mut frame = match input.next() {
        Some(Ok(frame)) => frame,
        Some(Err(e)) => {
          warn!("读取帧失败，按流结束处理: {}", e);
          break;
        }
        None => {
          info!("输入流结束");
          break;
        }
      };

      let report = self.pipeline.process(&model, &mut frame)?;
      output
        .render(&frame)
        .with_context(|| format!("第 {} 帧输出失败", frame.index))?;
      stats.record(&report);

      info!(
        "第 {} 帧: 检测 {} 个, 模糊 {} 个, 推理耗时 {:.2?}",
        report.index,
        report.detections.len(),
        report.blurred,
        report.inference
      );
    }

    match stats.mean_inference() {
      Some(mean) => info!(
        "任务完成: 共 {} 帧, 检测 {} 个, 平均推理耗时 {:.2?}",
        stats.frames, stats.detections, mean
      ),
      None => info!("任务完成: 没有处理任何帧"),
    }
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    blur::BlurMode,
    detect::RawOutput,
    model::ModelError,
    palette::ColorPalette,
  };
  use image::RgbImage;
  use std::{cell::RefCell, convert::Infallible};

  struct FixedModel(Vec<RawOutput>);

  impl Model for FixedModel {
    type Error = ModelError;

    fn infer(&self, _image: &RgbImage) -> Result<Vec<RawOutput>, Self::Error> {
      Ok(self.0.clone())
    }
  }

  #[derive(Default)]
  struct Collect(RefCell<Vec<u64>>);

  impl Render for &Collect {
    type Error = Infallible;

    fn render(&self, frame: &Frame) -> Result<(), Self::Error> {
      self.0.borrow_mut().push(frame.index);
      Ok(())
    }
  }

  fn labels() -> LabelTable {
    LabelTable::from_names(["person", "car"])
  }

  fn pipeline() -> Pipeline {
    Pipeline::new(
      labels(),
      DetectionConfig::default(),
      BlurConfig::default(),
      Annotator::new(ColorPalette::new(2)),
    )
  }

  fn frames(count: u64) -> impl Iterator<Item = Result<Frame, InputError>> {
    (0..count).map(|i| Ok(Frame::new(RgbImage::new(64, 64), i, i * 40)))
  }

  fn person_model() -> FixedModel {
    FixedModel(vec![
      RawOutput::from_rows(&[[0.5, 0.5, 0.25, 0.25, 1.0, 0.9, 0.1]]).unwrap(),
    ])
  }

  #[test]
  fn process_reports_detections() {
    let mut frame = Frame::new(RgbImage::new(64, 64), 7, 0);
    let report = pipeline().process(&person_model(), &mut frame).unwrap();

    assert_eq!(report.index, 7);
    assert_eq!(report.candidates, 1);
    assert_eq!(report.detections.len(), 1);
    assert_eq!(report.detections[0].class_id, 0);
    assert_eq!(report.blurred, 0);
  }

  #[test]
  fn blur_mode_flows_into_report() {
    let blur = BlurConfig::new(BlurMode::Inside, 3, Default::default()).unwrap();
    let pipeline = Pipeline::new(
      labels(),
      DetectionConfig::default(),
      blur,
      Annotator::new(ColorPalette::new(2)),
    );
    let mut frame = Frame::new(RgbImage::new(64, 64), 0, 0);
    let report = pipeline.process(&person_model(), &mut frame).unwrap();
    assert_eq!(report.blurred, 1);
  }

  #[test]
  fn runs_until_end_of_stream() {
    let (_tx, stop) = StopSignal::manual();
    let output = Collect::default();
    let stats = ContinuousTask::new(pipeline(), stop)
      .run_task(frames(3), person_model(), &output)
      .unwrap();

    assert_eq!(stats.frames, 3);
    assert_eq!(stats.detections, 3);
    assert_eq!(*output.0.borrow(), vec![0, 1, 2]);
    assert!(stats.mean_inference().is_some());
  }

  #[test]
  fn frame_limit() {
    let (_tx, stop) = StopSignal::manual();
    let output = Collect::default();
    let stats = ContinuousTask::new(pipeline(), stop)
      .with_frame_number(Some(2))
      .run_task(frames(10), person_model(), &output)
      .unwrap();
    assert_eq!(stats.frames, 2);
  }

  #[test]
  fn stop_signal_is_checked_before_each_frame() {
    let (tx, stop) = StopSignal::manual();
    tx.send(()).unwrap();
    let output = Collect::default();
    let stats = ContinuousTask::new(pipeline(), stop)
      .run_task(frames(5), person_model(), &output)
      .unwrap();
    assert_eq!(stats.frames, 0);
    assert!(output.0.borrow().is_empty());
    assert_eq!(stats.mean_inference(), None);
  }

  #[test]
  fn read_failure_ends_the_loop_cleanly() {
    let (_tx, stop) = StopSignal::manual();
    let input = frames(2).chain(std::iter::once(Err(InputError::Capture(
      "设备断开".to_string(),
    ))));
    let output = Collect::default();
    let stats = ContinuousTask::new(pipeline(), stop)
      .run_task(input.chain(frames(3)), person_model(), &output)
      .unwrap();
    assert_eq!(stats.frames, 2);
  }

  #[test]
  fn malformed_tensor_aborts_the_run() {
    let (_tx, stop) = StopSignal::manual();
    let model = FixedModel(vec![RawOutput::from_rows(&[[0.5; 9]]).unwrap()]);
    let output = Collect::default();
    let result = ContinuousTask::new(pipeline(), stop).run_task(frames(3), model, &output);
    assert!(result.is_err());
    assert!(output.0.borrow().is_empty());
  }
}
