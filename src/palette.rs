// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/palette.rs - 类别颜色表
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

use image::Rgb;

// 黄金角，相邻类别的色相尽量拉开
const GOLDEN_ANGLE: f32 = 137.507_77;
const SATURATION: f32 = 0.8;
const VALUE: f32 = 0.9;

/// 类别索引到颜色的确定性映射
///
/// 同一类别在不同帧、不同运行之间颜色一致。
#[derive(Debug, Clone)]
pub struct ColorPalette {
  colors: Box<[Rgb<u8>]>,
}

impl ColorPalette {
  pub fn new(num_classes: usize) -> Self {
    let colors = (0..num_classes.max(1)).map(Self::derive).collect();
    Self { colors }
  }

  pub fn color(&self, class_id: usize) -> Rgb<u8> {
    self
      .colors
      .get(class_id)
      .copied()
      .unwrap_or_else(|| Self::derive(class_id))
  }

  fn derive(class_id: usize) -> Rgb<u8> {
    let hue = (class_id as f32 * GOLDEN_ANGLE) % 360.0;
    hsv_to_rgb(hue, SATURATION, VALUE)
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}
