// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/config.rs - 检测参数配置
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

use thiserror::Error;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 [0, 1] 内: {0}")]
  ConfidenceThreshold(f32),
  #[error("NMS 重叠阈值必须在 [0, 1] 内: {0}")]
  OverlapThreshold(f32),
  #[error("模糊核大小必须为正奇数: {0}")]
  BlurKernelSize(u32),
}

/// 解码与抑制阈值，启动时设置一次
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
  confidence_threshold: f32,
  overlap_threshold: f32,
}

impl DetectionConfig {
  pub fn new(confidence_threshold: f32, overlap_threshold: f32) -> Result<Self, ConfigError> {
    if !(0.0..=1.0).contains(&confidence_threshold) {
      return Err(ConfigError::ConfidenceThreshold(confidence_threshold));
    }
    if !(0.0..=1.0).contains(&overlap_threshold) {
      return Err(ConfigError::OverlapThreshold(overlap_threshold));
    }
    Ok(Self {
      confidence_threshold,
      overlap_threshold,
    })
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn overlap_threshold(&self) -> f32 {
    self.overlap_threshold
  }
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
    }
  }
}
