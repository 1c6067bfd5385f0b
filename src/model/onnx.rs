// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
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

use image::{RgbImage, imageops::FilterType};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detect::RawOutput,
  model::{Model, ModelError},
};

const DEFAULT_INPUT_SIZE: u32 = 416;

/// 基于 ONNX Runtime 的 YOLO 推理
///
/// 输入为 RGB、缩放到 `size x size`、像素值除以 255 的 NCHW 张量；
/// 每个输出张量按最后一维切成行。
pub struct OnnxModel {
  session: Mutex<Session>,
  input_size: u32,
}

impl FromUrlWithScheme for OnnxModel {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxModel {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ModelError::SchemeMismatch(url.scheme().to_string()));
    }

    let input_size = url
      .query_pairs()
      .find(|(k, _)| k == "size")
      .and_then(|(_, v)| v.parse().ok())
      .unwrap_or(DEFAULT_INPUT_SIZE);

    info!("加载模型文件: {}", url.path());
    let session = Session::builder()
      .map_err(|e| ModelError::Load(e.to_string()))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| ModelError::Load(e.to_string()))?
      .commit_from_file(url.path())
      .map_err(|e| ModelError::Load(e.to_string()))?;
    info!("模型加载完成");
    debug!("模型输入尺寸: {}x{}", input_size, input_size);

    Ok(Self {
      session: Mutex::new(session),
      input_size,
    })
  }
}

impl OnnxModel {
  fn blob(&self, image: &RgbImage) -> Vec<f32> {
    let size = self.input_size;
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0f32; plane * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y * size + x) as usize;
      for c in 0..3 {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
    data
  }
}

impl Model for OnnxModel {
  type Error = ModelError;

  fn infer(&self, image: &RgbImage) -> Result<Vec<RawOutput>, Self::Error> {
    let size = self.input_size as usize;
    let input = Tensor::from_array(([1usize, 3, size, size], self.blob(image)))?;

    let mut session = self.session.lock().map_err(|_| ModelError::Poisoned)?;
    let outputs = session.run(ort::inputs![input])?;

    let mut raw = Vec::with_capacity(outputs.len());
    for (name, value) in outputs.iter() {
      let (shape, data) = value.try_extract_tensor::<f32>()?;
      let width = shape.last().copied().unwrap_or(0).max(0) as usize;
      debug!("输出 {}: 形状 {:?}", name, shape);
      raw.push(RawOutput::new(width, data.to_vec())?);
    }

    Ok(raw)
  }
}
