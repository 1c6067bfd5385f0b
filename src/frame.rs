// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use image::{RgbImage, imageops::FilterType};

pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 360;

/// 处理尺寸，输入源产出的每一帧都会被缩放到该尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
  pub width: u32,
  pub height: u32,
}

impl Default for FrameSize {
  fn default() -> Self {
    Self {
      width: DEFAULT_FRAME_WIDTH,
      height: DEFAULT_FRAME_HEIGHT,
    }
  }
}

impl FrameSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  /// 从 URL 查询参数 `width` / `height` 读取，缺省时使用默认值
  pub fn from_query(url: &url::Url) -> Self {
    let mut size = Self::default();
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "width" => size.width = value.parse().unwrap_or(size.width),
        "height" => size.height = value.parse().unwrap_or(size.height),
        _ => {}
      }
    }
    size
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// 尺寸不一致时缩放
  pub fn fit(&self, image: RgbImage) -> RgbImage {
    if image.dimensions() == (self.width, self.height) {
      image
    } else {
      image::imageops::resize(&image, self.width, self.height, FilterType::Triangle)
    }
  }
}

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn size_from_query() {
    let url = url::Url::parse("folder:///tmp/frames?width=320&height=240").unwrap();
    assert_eq!(FrameSize::from_query(&url), FrameSize::new(320, 240));
  }

  #[test]
  fn size_defaults_without_query() {
    let url = url::Url::parse("v4l2:///dev/video0").unwrap();
    assert_eq!(FrameSize::from_query(&url), FrameSize::new(640, 360));
  }

  #[test]
  fn fit_resizes_only_when_needed() {
    let size = FrameSize::new(8, 4);
    let same = size.fit(RgbImage::new(8, 4));
    assert_eq!(same.dimensions(), (8, 4));
    let resized = size.fit(RgbImage::new(16, 16));
    assert_eq!(resized.dimensions(), (8, 4));
  }
}
