// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/model/replay.rs - 原始输出回放模型
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

//! # 回放模型
//!
//! 从 JSON 文件读取事先录制的推理输出，每次推理按顺序返回一帧，到末尾后循环。
//!
//! 文件格式为四层嵌套数组: 帧 → 输出层 → 行 → `[cx, cy, w, h, objectness, scores...]`。
//!
//! ```no_run
//! use mengsha::{FromUrl, model::ReplayModel};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("replay:///data/outputs.json")?;
//! let model = ReplayModel::from_url(&url)?;
//! # Ok(())
//! # }
//! ```

use std::{cell::Cell, fs::File, io::BufReader, path::Path};

use image::RgbImage;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detect::RawOutput,
  model::{Model, ModelError},
};

type RecordedFrame = Vec<Vec<Vec<f32>>>;

pub struct ReplayModel {
  frames: Box<[Box<[RawOutput]>]>,
  cursor: Cell<usize>,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
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

    Self::from_file(url.path())
  }
}

impl ReplayModel {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
    let path = path.as_ref();
    info!("加载回放文件: {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let recorded: Vec<RecordedFrame> = serde_json::from_reader(reader)?;
    Self::from_recorded(recorded)
  }

  pub fn from_recorded(recorded: Vec<RecordedFrame>) -> Result<Self, ModelError> {
    if recorded.is_empty() {
      return Err(ModelError::Format("回放文件中没有任何帧".to_string()));
    }

    let frames = recorded
      .into_iter()
      .map(|layers| {
        layers
          .iter()
          .map(|rows| RawOutput::from_rows(rows.as_slice()))
          .collect::<Result<Box<[_]>, _>>()
      })
      .collect::<Result<Box<[_]>, _>>()?;

    debug!("回放帧数: {}", frames.len());
    Ok(Self::new(frames))
  }

  pub fn new(frames: Box<[Box<[RawOutput]>]>) -> Self {
    Self {
      frames,
      cursor: Cell::new(0),
    }
  }
}

impl Model for ReplayModel {
  type Error = ModelError;

  fn infer(&self, _image: &RgbImage) -> Result<Vec<RawOutput>, Self::Error> {
    if self.frames.is_empty() {
      return Err(ModelError::Format("回放帧为空".to_string()));
    }
    let index = self.cursor.get() % self.frames.len();
    self.cursor.set(index + 1);
    Ok(self.frames[index].to_vec())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn cycles_through_recorded_frames() {
    let model = ReplayModel::from_recorded(vec![
      vec![vec![vec![0.5, 0.5, 0.1, 0.1, 1.0, 0.9]]],
      vec![],
    ])
    .unwrap();
    let image = RgbImage::new(4, 4);

    assert_eq!(model.infer(&image).unwrap().len(), 1);
    assert!(model.infer(&image).unwrap().is_empty());
    assert_eq!(model.infer(&image).unwrap()[0].num_rows(), 1);
  }

  #[test]
  fn empty_recording_is_rejected() {
    assert!(matches!(
      ReplayModel::from_recorded(Vec::new()),
      Err(ModelError::Format(_))
    ));
  }

  #[test]
  fn ragged_rows_are_rejected() {
    let result = ReplayModel::from_recorded(vec![vec![vec![vec![0.0; 6], vec![0.0; 5]]]]);
    assert!(matches!(result, Err(ModelError::Tensor(_))));
  }

  #[test]
  fn loads_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[[[[0.5, 0.5, 0.2, 0.2, 1.0, 0.9, 0.1]]]]").unwrap();
    let url = Url::from_file_path(file.path()).unwrap();
    let url = Url::parse(&url.as_str().replacen("file", "replay", 1)).unwrap();

    let model = ReplayModel::from_url(&url).unwrap();
    let outputs = model.infer(&RgbImage::new(1, 1)).unwrap();
    assert_eq!(outputs[0].width(), 7);
  }

  #[test]
  fn wrong_scheme() {
    let url = Url::parse("onnx:///model.onnx").unwrap();
    assert!(matches!(
      ReplayModel::from_url(&url),
      Err(ModelError::SchemeMismatch(_))
    ));
  }
}
