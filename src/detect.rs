// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/detect.rs - 检测结果定义
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

mod decode;
mod nms;

pub use self::decode::Decoder;
pub use self::nms::suppress;

/// 每行前 5 个元素: cx, cy, w, h, objectness
pub const BOX_FIELDS: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("张量 {tensor} 行宽不匹配: 期望 {expected}, 实际 {found}")]
  MalformedTensor {
    tensor: usize,
    expected: usize,
    found: usize,
  },
  #[error("张量数据长度 {len} 不是行宽 {width} 的整数倍")]
  RaggedTensor { len: usize, width: usize },
}

/// 像素坐标下的边界框，原点在左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BBox {
  pub x: i32,
  pub y: i32,
  pub w: i32,
  pub h: i32,
}

impl BBox {
  pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
    Self { x, y, w, h }
  }

  pub fn area(&self) -> i64 {
    self.w.max(0) as i64 * self.h.max(0) as i64
  }

  pub fn right(&self) -> i32 {
    self.x.saturating_add(self.w)
  }

  pub fn bottom(&self) -> i32 {
    self.y.saturating_add(self.h)
  }

  // (left, top, right, bottom)，在 i64 中计算避免溢出
  fn to_i64(&self) -> (i64, i64, i64, i64) {
    let (x, y) = (self.x as i64, self.y as i64);
    (x, y, x + self.w as i64, y + self.h as i64)
  }

  /// 交并比，并集为 0 时返回 0
  pub fn iou(&self, other: &BBox) -> f32 {
    let (a, b) = (self.to_i64(), other.to_i64());
    let x1 = a.0.max(b.0);
    let y1 = a.1.max(b.1);
    let x2 = a.2.min(b.2);
    let y2 = a.3.min(b.3);

    let intersection = (x2 - x1).max(0) * (y2 - y1).max(0);
    let union = self.area() + other.area() - intersection;

    if union > 0 {
      intersection as f32 / union as f32
    } else {
      0.0
    }
  }

  /// 裁剪到 `[0, width) x [0, height)`，返回 (x, y, w, h)；裁剪后为空时返回 None
  pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let (width, height) = (width as i64, height as i64);
    let x1 = (self.x as i64).clamp(0, width);
    let y1 = (self.y as i64).clamp(0, height);
    let x2 = (self.x as i64 + self.w as i64).clamp(0, width);
    let y2 = (self.y as i64 + self.h as i64).clamp(0, height);

    if x2 <= x1 || y2 <= y1 {
      return None;
    }

    Some((x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32))
  }
}

/// 一个候选检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub bbox: BBox,
  pub confidence: f32,
  pub class_id: usize,
}

/// 推理引擎某一输出层的原始张量，按行存储
///
/// 每行为 `[cx, cy, w, h, objectness, class scores...]`，坐标相对模型输入归一化。
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  width: usize,
  data: Box<[f32]>,
}

impl RawOutput {
  pub fn new(width: usize, data: impl Into<Box<[f32]>>) -> Result<Self, DecodeError> {
    let data = data.into();
    if width == 0 || data.len() % width != 0 {
      return Err(DecodeError::RaggedTensor {
        len: data.len(),
        width,
      });
    }
    Ok(Self { width, data })
  }

  pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, DecodeError> {
    let width = rows.first().map(|row| row.as_ref().len()).unwrap_or(0);
    let mut data = Vec::with_capacity(width * rows.len());
    for row in rows {
      let row = row.as_ref();
      if row.len() != width {
        return Err(DecodeError::RaggedTensor {
          len: row.len(),
          width,
        });
      }
      data.extend_from_slice(row);
    }
    if rows.is_empty() {
      return Ok(Self {
        width: 0,
        data: Box::new([]),
      });
    }
    Self::new(width, data)
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn num_rows(&self) -> usize {
    if self.width == 0 {
      0
    } else {
      self.data.len() / self.width
    }
  }

  pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
    self.data.chunks_exact(self.width.max(1))
  }
}
