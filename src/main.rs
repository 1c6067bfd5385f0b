// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use mengsha::{
  FromUrl,
  input::InputWrapper,
  label::LabelTable,
  model::ModelWrapper,
  output::{OutputWrapper, draw::Annotator},
  palette::ColorPalette,
  task::{ContinuousTask, Pipeline, StopSignal, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let detection = args.detection_config()?;
  let blur = args.blur_config()?;

  info!("Mengsha 隐私模糊检测");
  info!("模型: {}", args.model);
  info!("输入: {}", args.input);
  info!(
    "置信度阈值: {}, NMS 阈值: {}",
    detection.confidence_threshold(),
    detection.overlap_threshold()
  );
  info!(
    "模糊模式: {:?}, 核大小: {}",
    blur.mode(),
    blur.kernel_size()
  );

  let labels = match &args.labels {
    Some(path) => LabelTable::from_file(path)?,
    None => {
      info!("未指定标签文件，使用内置 COCO 类别");
      LabelTable::coco()
    }
  };
  for label in blur.blurrable().iter() {
    if !labels.iter().any(|name| name == label) {
      warn!("可模糊类别 '{}' 不在标签表中，不会匹配任何检测", label);
    }
  }

  let annotator = Annotator::new(ColorPalette::new(labels.len()));
  let annotator = match &args.font {
    Some(path) => annotator.with_font_file(path)?,
    None => annotator,
  };

  let model = ModelWrapper::from_url(&args.model).context("模型加载失败")?;
  let input = InputWrapper::from_url(&args.input).context("输入打开失败")?;
  let output = OutputWrapper::from_optional_url(args.output.as_ref()).context("输出创建失败")?;
  if let Some(url) = &args.output {
    info!("输出: {}", url);
  }

  let stop = StopSignal::ctrlc().context("无法设置 Ctrl-C 处理函数")?;
  let pipeline = Pipeline::new(labels, detection, blur, annotator);

  ContinuousTask::new(pipeline, stop)
    .with_frame_number(args.max_frames)
    .run_task(input, model, output)?;

  Ok(())
}
