// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/model.rs - 推理模型
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

#[cfg(any(feature = "model_replay", feature = "model_onnx"))]
use crate::FromUrlWithScheme;
use crate::{
  FromUrl,
  detect::{DecodeError, RawOutput},
};

/// 推理引擎边界：输入一帧，输出各层原始张量
pub trait Model {
  type Error;

  fn infer(&self, image: &RgbImage) -> Result<Vec<RawOutput>, Self::Error>;
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型 URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("模型加载错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型加载失败: {0}")]
  Load(String),
  #[error("回放文件解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("模型输出格式错误: {0}")]
  Format(String),
  #[error("模型输出张量错误: {0}")]
  Tensor(#[from] DecodeError),
  #[cfg(feature = "model_onnx")]
  #[error("ONNX Runtime 错误: {0}")]
  Onnx(#[from] ort::Error),
  #[error("模型会话锁已失效")]
  Poisoned,
}

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::ReplayModel;

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::OnnxModel;

pub enum ModelWrapper {
  #[cfg(feature = "model_replay")]
  Replay(ReplayModel),
  #[cfg(feature = "model_onnx")]
  Onnx(OnnxModel),
}

impl FromUrl for ModelWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "model_replay")]
      ReplayModel::SCHEME => {
        Ok(ModelWrapper::Replay(ReplayModel::from_url(url)?))
      }
      #[cfg(feature = "model_onnx")]
      OnnxModel::SCHEME => {
        Ok(ModelWrapper::Onnx(OnnxModel::from_url(url)?))
      }
      scheme => Err(ModelError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Model for ModelWrapper {
  type Error = ModelError;

  #[allow(unused_variables)]
  fn infer(&self, image: &RgbImage) -> Result<Vec<RawOutput>, Self::Error> {
    match self {
      #[cfg(feature = "model_replay")]
      ModelWrapper::Replay(model) => model.infer(image),
      #[cfg(feature = "model_onnx")]
      ModelWrapper::Onnx(model) => model.infer(image),
    }
  }
}
