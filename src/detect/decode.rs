// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/detect/decode.rs - 原始输出解码
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

use tracing::{debug, error};

use super::{BBox, BOX_FIELDS, DecodeError, Detection, RawOutput};

/// 将推理输出的原始张量转换为像素坐标下的候选检测
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
  num_classes: usize,
}

impl Decoder {
  pub fn new(num_classes: usize) -> Self {
    Self { num_classes }
  }

  /// 每行期望的元素个数
  pub fn row_width(&self) -> usize {
    BOX_FIELDS + self.num_classes
  }

  /// 逐层逐行解码，置信度严格大于阈值的行才会保留
  ///
  /// 坐标先按帧尺寸缩放再向零截断，左上角为 `trunc(cx - w / 2)`。
  pub fn decode(
    &self,
    outputs: &[RawOutput],
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
  ) -> Result<Vec<Detection>, DecodeError> {
    let (fw, fh) = (frame_width as f32, frame_height as f32);
    let mut detections = Vec::new();

    for (tensor, output) in outputs.iter().enumerate() {
      if output.num_rows() == 0 {
        continue;
      }
      if output.width() != self.row_width() {
        error!(
          "输出张量 {} 行宽 {} 与类别数 {} 不匹配",
          tensor,
          output.width(),
          self.num_classes
        );
        return Err(DecodeError::MalformedTensor {
          tensor,
          expected: self.row_width(),
          found: output.width(),
        });
      }

      for row in output.rows() {
        let (class_id, confidence) = argmax(&row[BOX_FIELDS..]);
        if confidence <= confidence_threshold {
          continue;
        }

        let cx = (row[0] * fw) as i32;
        let cy = (row[1] * fh) as i32;
        let w = (row[2] * fw) as i32;
        let h = (row[3] * fh) as i32;

        let x = (cx as f32 - w as f32 / 2.0) as i32;
        let y = (cy as f32 - h as f32 / 2.0) as i32;

        detections.push(Detection {
          bbox: BBox::new(x, y, w, h),
          confidence,
          class_id,
        });
      }
    }

    debug!("解码得到 {} 个候选检测", detections.len());
    Ok(detections)
  }
}

/// 返回最大值的下标和值，相同最大值取最小下标
fn argmax(scores: &[f32]) -> (usize, f32) {
  let mut best = (0usize, f32::NEG_INFINITY);
  for (idx, &score) in scores.iter().enumerate() {
    if score > best.1 {
      best = (idx, score);
    }
  }
  best
}
