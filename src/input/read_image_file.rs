// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::time::Instant;

use image::{ImageReader, RgbImage};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameSize},
  input::InputError,
};

/// 单张图像，按 `repeat` 参数重复输出（默认一次）
///
/// `image:///path/to/photo.jpg?repeat=10&width=640&height=360`
pub struct ImageFileInput {
  image: RgbImage,
  repeat: u64,
  emitted: u64,
  started: Instant,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let size = FrameSize::from_query(url);
    if size.is_empty() {
      return Err(InputError::EmptySize {
        width: size.width,
        height: size.height,
      });
    }
    let repeat = url
      .query_pairs()
      .find(|(k, _)| k == "repeat")
      .and_then(|(_, v)| v.parse().ok())
      .unwrap_or(1);

    info!("读取图像文件: {}", url.path());
    let image = ImageReader::open(url.path())?.decode()?.to_rgb8();

    Ok(Self::new(size.fit(image), repeat))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbImage, repeat: u64) -> Self {
    Self {
      image,
      repeat,
      emitted: 0,
      started: Instant::now(),
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.emitted >= self.repeat {
      return None;
    }
    let index = self.emitted;
    self.emitted += 1;
    let timestamp_ms = self.started.elapsed().as_millis() as u64;
    Some(Ok(Frame::new(self.image.clone(), index, timestamp_ms)))
  }
}
