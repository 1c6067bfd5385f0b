// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use std::path::Path;

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  detect::{BBox, Detection},
  label::LabelTable,
  palette::ColorPalette,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_HEIGHT: i32 = 18;
const LABEL_TEXT_HORIZONTAL_PADDING: i32 = 2;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 1;
const LABEL_OFFSET: i32 = 5; // 标签底边与检测框上边的距离
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件: {0}")]
  Io(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  Invalid(#[from] InvalidFont),
}

/// 标签文本，置信度保留四位小数
pub fn label_text(name: &str, confidence: f32) -> String {
  format!("{}: {:.4}", name, confidence)
}

/// 计算标签底色矩形，位于检测框左上角正上方并限制在帧内
///
/// 返回 `(x, y, width, height)`，帧内没有空间时返回 None。
pub fn label_rect(
  bbox: &BBox,
  text_width: u32,
  frame_width: u32,
  frame_height: u32,
) -> Option<(i32, i32, u32, u32)> {
  if frame_width == 0 || frame_height == 0 {
    return None;
  }
  // 检测框完全在帧外时不绘制标签
  bbox.clamp_to(frame_width, frame_height)?;

  let height = (LABEL_TEXT_HEIGHT as u32).min(frame_height);
  let max_y = frame_height as i32 - height as i32;
  let y = (bbox.y - LABEL_OFFSET - height as i32).clamp(0, max_y);
  let x = bbox.x.clamp(0, frame_width as i32 - 1);

  let width = text_width.min(frame_width - x as u32);
  if width == 0 {
    return None;
  }

  Some((x, y, width, height))
}

/// 在帧上绘制检测框和标签
///
/// 默认使用内嵌的 DejaVu Sans 字体，可通过 [`Annotator::with_font_file`] 替换。
pub struct Annotator {
  palette: ColorPalette,
  font: FontArc,
  scale: PxScale,
}

impl Annotator {
  pub fn new(palette: ColorPalette) -> Self {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载内嵌字体");
    Self {
      palette,
      font,
      scale: PxScale::from(LABEL_FONT_SIZE),
    }
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = font;
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, FontError> {
    let path = path.as_ref();
    info!("加载字体文件: {}", path.display());
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    Ok(self.with_font(font))
  }

  pub fn palette(&self) -> &ColorPalette {
    &self.palette
  }

  /// 绘制全部检测，返回同一帧
  pub fn annotate<'f>(
    &self,
    image: &'f mut RgbImage,
    detections: &[Detection],
    labels: &LabelTable,
  ) -> &'f mut RgbImage {
    for detection in detections {
      let color = self.palette.color(detection.class_id);
      let name = labels.name(detection.class_id).unwrap_or("unknown");
      self.draw_bbox(image, &detection.bbox, color);
      self.draw_label(image, &detection.bbox, &label_text(name, detection.confidence), color);
    }
    image
  }

  // 边框加粗为 2 像素
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    if bbox.w <= 0 || bbox.h <= 0 {
      return;
    }

    let outer = Rect::at(bbox.x, bbox.y).of_size(bbox.w as u32, bbox.h as u32);
    draw_hollow_rect_mut(image, outer, color);

    if bbox.w > 2 && bbox.h > 2 {
      let inner = Rect::at(bbox.x + 1, bbox.y + 1).of_size(bbox.w as u32 - 2, bbox.h as u32 - 2);
      draw_hollow_rect_mut(image, inner, color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, bbox: &BBox, text: &str, color: Rgb<u8>) {
    let (measured, _) = text_size(self.scale, &self.font, text);
    let text_width = measured + 2 * LABEL_TEXT_HORIZONTAL_PADDING as u32;
    let Some((x, y, width, height)) = label_rect(bbox, text_width, image.width(), image.height())
    else {
      return;
    };

    draw_filled_rect_mut(image, Rect::at(x, y).of_size(width, height), color);

    draw_text_mut(
      image,
      TEXT_COLOR,
      x + LABEL_TEXT_HORIZONTAL_PADDING,
      y + LABEL_TEXT_VERTICAL_PADDING,
      self.scale,
      &self.font,
      text,
    );
  }
}
