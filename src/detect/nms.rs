// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/detect/nms.rs - 非极大值抑制
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

use tracing::debug;

use super::Detection;

/// 非极大值抑制
///
/// 按置信度降序（同置信度保持解码顺序）依次保留候选，并丢弃与已保留框
/// IoU 严格大于 `overlap_threshold` 的候选。所有类别一起抑制，不按类别分组。
/// 返回结果按保留顺序排列，即置信度降序。
pub fn suppress(
  mut candidates: Vec<Detection>,
  confidence_threshold: f32,
  overlap_threshold: f32,
) -> Vec<Detection> {
  let before = candidates.len();
  candidates.retain(|det| det.confidence > confidence_threshold);
  // sort_by 是稳定排序
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    if kept
      .iter()
      .all(|best| best.bbox.iou(&candidate.bbox) <= overlap_threshold)
    {
      kept.push(candidate);
    }
  }

  debug!("NMS: {} 个候选, 保留 {} 个", before, kept.len());
  kept
}
