// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use mengsha::{
  blur::{BlurConfig, BlurMode, BlurrableLabels, DEFAULT_BLUR_KERNEL_SIZE},
  config::{ConfigError, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_OVERLAP_THRESHOLD, DetectionConfig},
};

/// Mengsha 隐私模糊检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理后端 URL
  /// - 回放: replay:///path/to/outputs.json
  /// - ONNX: onnx:///path/to/model.onnx?size=416
  #[arg(long, value_name = "URL")]
  pub model: Url,

  /// 输入来源 URL，可带 width/height 查询参数指定处理尺寸
  /// - 摄像头: v4l2:///dev/video0
  /// - 图片: image:///path/to/photo.jpg?repeat=10
  /// - 目录: folder:///path/to/frames
  ///
  /// 编译了摄像头支持时默认为 v4l2:///dev/video0，否则必须指定
  #[cfg_attr(
    feature = "v4l2_input",
    arg(long, value_name = "URL", default_value = "v4l2:///dev/video0")
  )]
  #[cfg_attr(not(feature = "v4l2_input"), arg(long, value_name = "URL"))]
  pub input: Url,

  /// 输出 URL，不指定时处理后直接丢弃
  /// - 图片: image:///path/to/out.png
  /// - 目录: folder:///path/to/records
  /// - 视频: gst:///path/to/out.avi?fps=25&width=640&height=360
  #[arg(short, long, value_name = "URL")]
  pub output: Option<Url>,

  /// 标签文件，每行一个类别名；不指定时使用内置 COCO 类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 标签文字使用的 TrueType 字体；不指定时使用内嵌的 DejaVu Sans
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(short, long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 高斯模糊核大小（正奇数）
  #[arg(short = 's', long, default_value_t = DEFAULT_BLUR_KERNEL_SIZE, value_name = "SIZE")]
  pub blur_size: u32,

  /// NMS 重叠阈值 (0.0 - 1.0)
  #[arg(short = 't', long, default_value_t = DEFAULT_OVERLAP_THRESHOLD, value_name = "THRESHOLD")]
  pub threshold: f32,

  /// 模糊检测框内部
  #[arg(short = 'b', long)]
  pub blur_inside: bool,

  /// 模糊检测框外部
  #[arg(short = 'B', long)]
  pub blur_outside: bool,

  /// 可模糊的类别，逗号分隔；为空时所有类别都可模糊
  #[arg(short = 'l', long, default_value = "", value_name = "LIST")]
  pub list_blurrable: String,

  /// 最大处理帧数
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<u64>,
}

impl Args {
  pub fn detection_config(&self) -> Result<DetectionConfig, ConfigError> {
    DetectionConfig::new(self.confidence, self.threshold)
  }

  pub fn blur_config(&self) -> Result<BlurConfig, ConfigError> {
    BlurConfig::new(
      BlurMode::from_flags(self.blur_inside, self.blur_outside),
      self.blur_size,
      BlurrableLabels::parse(&self.list_blurrable),
    )
  }
}
