// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/blur.rs - 模糊策略
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

//! # 模糊策略
//!
//! 根据检测结果和配置决定哪些像素需要被模糊：
//!
//! | inside | outside | 模式 | 行为 |
//! |---|---|---|---|
//! | false | false | [`BlurMode::None`] | 不修改帧 |
//! | true | false | [`BlurMode::Inside`] | 只模糊可模糊检测框内部 |
//! | false | true | [`BlurMode::Outside`] | 模糊除可模糊检测框以外的区域 |
//! | true | true | [`BlurMode::Full`] | 整帧模糊 |
//!
//! 可模糊标签列表为空时，所有标签都可模糊；否则标签必须与列表中某一项完全一致（区分大小写）。

use image::RgbImage;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::{config::ConfigError, detect::Detection, label::LabelTable};

pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlurMode {
  #[default]
  None,
  Inside,
  Outside,
  Full,
}

impl BlurMode {
  pub fn from_flags(inside: bool, outside: bool) -> Self {
    match (inside, outside) {
      (false, false) => BlurMode::None,
      (true, false) => BlurMode::Inside,
      (false, true) => BlurMode::Outside,
      (true, true) => BlurMode::Full,
    }
  }
}

/// 可模糊标签集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlurrableLabels {
  labels: Vec<String>,
}

impl BlurrableLabels {
  /// 解析逗号分隔的列表，去掉每项首尾空白并忽略空项
  pub fn parse(list: &str) -> Self {
    Self {
      labels: list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn contains(&self, label: &str) -> bool {
    self.labels.iter().any(|item| item == label)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

/// 列表为空时任何标签都可模糊
pub fn is_blurrable(label: &str, blurrable: &BlurrableLabels) -> bool {
  blurrable.is_empty() || blurrable.contains(label)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlurConfig {
  mode: BlurMode,
  kernel_size: u32,
  blurrable: BlurrableLabels,
}

impl BlurConfig {
  /// 核大小必须为正奇数
  pub fn new(
    mode: BlurMode,
    kernel_size: u32,
    blurrable: BlurrableLabels,
  ) -> Result<Self, ConfigError> {
    if kernel_size == 0 || kernel_size % 2 == 0 {
      return Err(ConfigError::BlurKernelSize(kernel_size));
    }
    Ok(Self {
      mode,
      kernel_size,
      blurrable,
    })
  }

  pub fn mode(&self) -> BlurMode {
    self.mode
  }

  pub fn kernel_size(&self) -> u32 {
    self.kernel_size
  }

  pub fn blurrable(&self) -> &BlurrableLabels {
    &self.blurrable
  }
}

impl Default for BlurConfig {
  fn default() -> Self {
    Self {
      mode: BlurMode::None,
      kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
      blurrable: BlurrableLabels::default(),
    }
  }
}

/// 由核大小推出高斯标准差，与 OpenCV 在 sigma 为 0 时的规则一致
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
  0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// 核大小为 1 时为恒等变换
pub fn gaussian_blur(image: &RgbImage, kernel_size: u32) -> RgbImage {
  if kernel_size <= 1 {
    return image.clone();
  }
  gaussian_blur_f32(image, sigma_for_kernel(kernel_size))
}

/// 只模糊给定区域，区域外像素不受影响
fn blur_region(frame: &mut RgbImage, (x, y, w, h): (u32, u32, u32, u32), kernel_size: u32) {
  let region = image::imageops::crop_imm(frame, x, y, w, h).to_image();
  let blurred = gaussian_blur(&region, kernel_size);
  image::imageops::replace(frame, &blurred, x as i64, y as i64);
}

fn copy_region(dst: &mut RgbImage, src: &RgbImage, (x, y, w, h): (u32, u32, u32, u32)) {
  let region = image::imageops::crop_imm(src, x, y, w, h).to_image();
  image::imageops::replace(dst, &region, x as i64, y as i64);
}

/// 模糊策略引擎
#[derive(Debug, Clone)]
pub struct BlurPolicy {
  config: BlurConfig,
}

impl BlurPolicy {
  pub fn new(config: BlurConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &BlurConfig {
    &self.config
  }

  fn blurrable_regions<'a>(
    &'a self,
    frame: &RgbImage,
    detections: &'a [Detection],
    labels: &'a LabelTable,
  ) -> impl Iterator<Item = (u32, u32, u32, u32)> + 'a {
    let (width, height) = frame.dimensions();
    detections
      .iter()
      .filter(move |det| {
        labels
          .name(det.class_id)
          .is_some_and(|name| is_blurrable(name, &self.config.blurrable))
      })
      .filter_map(move |det| det.bbox.clamp_to(width, height))
  }

  /// 按配置模糊帧，返回被处理的检测框数量
  ///
  /// 所有检测框之后仍会全部交给标注器绘制，与模式无关。
  pub fn apply(
    &self,
    frame: &mut RgbImage,
    detections: &[Detection],
    labels: &LabelTable,
  ) -> usize {
    let kernel_size = self.config.kernel_size;
    let touched = match self.config.mode {
      BlurMode::None => 0,
      BlurMode::Full => {
        *frame = gaussian_blur(frame, kernel_size);
        detections.len()
      }
      BlurMode::Inside => {
        let regions: Vec<_> = self.blurrable_regions(frame, detections, labels).collect();
        for region in &regions {
          blur_region(frame, *region, kernel_size);
        }
        regions.len()
      }
      // 没有任何检测时帧保持原样
      BlurMode::Outside if detections.is_empty() => 0,
      BlurMode::Outside => {
        let original = frame.clone();
        *frame = gaussian_blur(&original, kernel_size);
        let mut kept = 0;
        for region in self.blurrable_regions(&original, detections, labels) {
          copy_region(frame, &original, region);
          kept += 1;
        }
        kept
      }
    };

    debug!("模糊模式 {:?}, 处理检测框 {} 个", self.config.mode, touched);
    touched
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detect::BBox;
  use image::Rgb;

  fn checkerboard(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
      if (x + y) % 2 == 0 {
        Rgb([0, 0, 0])
      } else {
        Rgb([255, 255, 255])
      }
    })
  }

  fn det(x: i32, y: i32, w: i32, h: i32, class_id: usize) -> Detection {
    Detection {
      bbox: BBox::new(x, y, w, h),
      confidence: 0.9,
      class_id,
    }
  }

  fn policy(mode: BlurMode, list: &str) -> BlurPolicy {
    BlurPolicy::new(BlurConfig::new(mode, 5, BlurrableLabels::parse(list)).unwrap())
  }

  fn inside(bbox: BBox, x: u32, y: u32) -> bool {
    let (x, y) = (x as i32, y as i32);
    x >= bbox.x && x < bbox.right() && y >= bbox.y && y < bbox.bottom()
  }

  #[test]
  fn mode_from_flags() {
    assert_eq!(BlurMode::from_flags(false, false), BlurMode::None);
    assert_eq!(BlurMode::from_flags(true, false), BlurMode::Inside);
    assert_eq!(BlurMode::from_flags(false, true), BlurMode::Outside);
    assert_eq!(BlurMode::from_flags(true, true), BlurMode::Full);
  }

  #[test]
  fn empty_list_blurs_everything() {
    let empty = BlurrableLabels::parse("");
    assert!(is_blurrable("person", &empty));
    assert!(is_blurrable("traffic light", &empty));
    assert!(is_blurrable("", &empty));
  }

  #[test]
  fn list_membership_is_exact() {
    assert!(is_blurrable("dog", &BlurrableLabels::parse("cat,dog")));
    assert!(!is_blurrable("cat", &BlurrableLabels::parse("dog")));
    assert!(!is_blurrable("Dog", &BlurrableLabels::parse("dog")));
    assert!(!is_blurrable("do", &BlurrableLabels::parse("dog")));
    assert!(!is_blurrable("hot", &BlurrableLabels::parse("hot dog")));
  }

  #[test]
  fn list_entries_are_trimmed() {
    let list = BlurrableLabels::parse(" cat , traffic light ,,");
    assert_eq!(list.iter().collect::<Vec<_>>(), vec!["cat", "traffic light"]);
  }

  #[test]
  fn kernel_size_must_be_odd_and_positive() {
    let labels = BlurrableLabels::default();
    assert!(BlurConfig::new(BlurMode::Full, 0, labels.clone()).is_err());
    assert!(BlurConfig::new(BlurMode::Full, 24, labels.clone()).is_err());
    assert!(BlurConfig::new(BlurMode::Full, 1, labels.clone()).is_ok());
    assert!(BlurConfig::new(BlurMode::Full, 25, labels).is_ok());
  }

  #[test]
  fn sigma_follows_kernel_size() {
    assert!((sigma_for_kernel(25) - 4.1).abs() < 1e-5);
    assert!(sigma_for_kernel(1) > 0.0);
  }

  #[test]
  fn none_mode_leaves_frame_untouched() {
    let original = checkerboard(32, 32);
    let mut frame = original.clone();
    let labels = LabelTable::coco();
    let touched = policy(BlurMode::None, "").apply(&mut frame, &[det(0, 0, 10, 10, 0)], &labels);
    assert_eq!(touched, 0);
    assert_eq!(frame, original);
  }

  #[test]
  fn full_mode_changes_every_pixel() {
    let original = checkerboard(32, 32);
    let mut frame = original.clone();
    let labels = LabelTable::coco();
    policy(BlurMode::Full, "").apply(&mut frame, &[], &labels);
    for (a, b) in original.pixels().zip(frame.pixels()) {
      assert_ne!(a, b);
    }
  }

  #[test]
  fn inside_mode_keeps_pixels_outside_the_box() {
    let original = checkerboard(48, 32);
    let mut frame = original.clone();
    let labels = LabelTable::coco();
    let bbox = BBox::new(8, 6, 16, 12);
    let touched = policy(BlurMode::Inside, "").apply(&mut frame, &[det(8, 6, 16, 12, 0)], &labels);

    assert_eq!(touched, 1);
    let mut changed = 0;
    for (x, y, pixel) in frame.enumerate_pixels() {
      if inside(bbox, x, y) {
        if pixel != original.get_pixel(x, y) {
          changed += 1;
        }
      } else {
        assert_eq!(pixel, original.get_pixel(x, y), "pixel ({x}, {y}) changed");
      }
    }
    assert!(changed > 0);
  }

  #[test]
  fn inside_mode_only_blurs_listed_labels() {
    let original = checkerboard(64, 32);
    let mut frame = original.clone();
    let labels = LabelTable::coco();
    let person = BBox::new(2, 2, 20, 20);
    let detections = [det(36, 4, 20, 20, 2), det(2, 2, 20, 20, 0)];

    let touched = policy(BlurMode::Inside, "person").apply(&mut frame, &detections, &labels);
    assert_eq!(touched, 1);

    let mut person_changed = false;
    for (x, y, pixel) in frame.enumerate_pixels() {
      if inside(person, x, y) {
        person_changed |= pixel != original.get_pixel(x, y);
      } else {
        assert_eq!(pixel, original.get_pixel(x, y));
      }
    }
    assert!(person_changed);
  }

  #[test]
  fn outside_mode_restores_blurrable_boxes() {
    let original = checkerboard(64, 32);
    let mut frame = original.clone();
    let labels = LabelTable::coco();
    let person = BBox::new(4, 4, 12, 12);
    let car = BBox::new(40, 4, 12, 12);
    let detections = [det(4, 4, 12, 12, 0), det(40, 4, 12, 12, 2)];

    let kept = policy(BlurMode::Outside, "person").apply(&mut frame, &detections, &labels);
    assert_eq!(kept, 1);

    for (x, y, pixel) in frame.enumerate_pixels() {
      if inside(person, x, y) {
        assert_eq!(pixel, original.get_pixel(x, y));
      } else {
        assert_ne!(pixel, original.get_pixel(x, y), "pixel ({x}, {y}) not blurred");
      }
    }
    // car 不在列表中，保持模糊
    assert_ne!(frame.get_pixel(46, 10), original.get_pixel(46, 10));
    assert!(inside(car, 46, 10));
  }

  #[test]
  fn outside_mode_without_detections_leaves_frame_untouched() {
    let original = checkerboard(16, 16);
    let mut frame = original.clone();
    let touched = policy(BlurMode::Outside, "").apply(&mut frame, &[], &LabelTable::coco());
    assert_eq!(touched, 0);
    assert_eq!(frame, original);
  }

  #[test]
  fn outside_mode_without_blurrable_detections_blurs_whole_frame() {
    let original = checkerboard(16, 16);
    let mut frame = original.clone();
    let detections = [det(2, 2, 8, 8, 2)];
    let kept = policy(BlurMode::Outside, "person").apply(&mut frame, &detections, &LabelTable::coco());
    assert_eq!(kept, 0);
    assert!(original.pixels().zip(frame.pixels()).all(|(a, b)| a != b));
  }

  #[test]
  fn empty_detection_set_only_changes_frame_in_full_mode() {
    let original = checkerboard(16, 16);
    let labels = LabelTable::coco();
    for mode in [BlurMode::None, BlurMode::Inside, BlurMode::Outside] {
      let mut frame = original.clone();
      policy(mode, "").apply(&mut frame, &[], &labels);
      assert_eq!(frame, original, "{mode:?}");
    }
  }

  #[test]
  fn boxes_past_the_edge_are_clamped() {
    let original = checkerboard(32, 32);
    let labels = LabelTable::coco();
    let detections = [det(-10, -10, 20, 20, 0), det(28, 28, 40, 40, 0), det(100, 100, 5, 5, 0)];

    let mut frame = original.clone();
    let touched = policy(BlurMode::Inside, "").apply(&mut frame, &detections, &labels);
    assert_eq!(touched, 2);
    assert_eq!(frame.get_pixel(20, 20), original.get_pixel(20, 20));

    let mut frame = original.clone();
    let kept = policy(BlurMode::Outside, "").apply(&mut frame, &detections, &labels);
    assert_eq!(kept, 2);
    assert_eq!(frame.get_pixel(0, 0), original.get_pixel(0, 0));
    assert_eq!(frame.get_pixel(31, 31), original.get_pixel(31, 31));
  }
}
