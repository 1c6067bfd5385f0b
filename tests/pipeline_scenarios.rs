// 该文件是 Mengsha （蒙纱） 项目的一部分。
// tests/pipeline_scenarios.rs - 端到端处理流程测试
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

use image::{Rgb, RgbImage};
use mengsha::{
  blur::{BlurConfig, BlurMode, BlurrableLabels},
  config::DetectionConfig,
  detect::{BBox, RawOutput},
  frame::Frame,
  label::LabelTable,
  model::{Model, ModelError},
  output::draw::Annotator,
  palette::ColorPalette,
  task::Pipeline,
};

struct FixedModel(Vec<RawOutput>);

impl FixedModel {
  fn rows(rows: &[[f32; 7]]) -> Self {
    Self(vec![RawOutput::from_rows(rows).unwrap()])
  }
}

impl Model for FixedModel {
  type Error = ModelError;

  fn infer(&self, _image: &RgbImage) -> Result<Vec<RawOutput>, Self::Error> {
    Ok(self.0.clone())
  }
}

fn labels() -> LabelTable {
  LabelTable::from_names(["person", "car"])
}

fn pipeline(blur: BlurConfig) -> Pipeline {
  Pipeline::new(
    labels(),
    DetectionConfig::default(),
    blur,
    Annotator::new(ColorPalette::new(2)),
  )
}

fn checkerboard(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    if (x + y) % 2 == 0 {
      Rgb([255, 255, 255])
    } else {
      Rgb([0, 0, 0])
    }
  })
}

fn region_equal(a: &RgbImage, b: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> bool {
  ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
    .all(|(x, y)| a.get_pixel(x, y) == b.get_pixel(x, y))
}

#[test]
fn single_person_row_becomes_one_pixel_box() {
  let model = FixedModel::rows(&[[0.5, 0.5, 0.2, 0.2, 1.0, 0.9, 0.0]]);
  let mut frame = Frame::new(RgbImage::new(640, 640), 0, 0);

  let report = pipeline(BlurConfig::default())
    .process(&model, &mut frame)
    .unwrap();

  assert_eq!(report.detections.len(), 1);
  let detection = &report.detections[0];
  assert_eq!(detection.class_id, 0);
  assert_eq!(detection.bbox, BBox::new(256, 256, 128, 128));
  assert_eq!(detection.bbox.x + detection.bbox.w / 2, 320);
}

#[test]
fn overlapping_candidates_keep_the_most_confident() {
  // 两个框 IoU = 2000 / 2500 = 0.8
  let model = FixedModel::rows(&[
    [0.5, 0.5, 0.5, 0.4, 1.0, 0.6, 0.0],
    [0.5, 0.5, 0.5, 0.5, 1.0, 0.9, 0.0],
  ]);
  let mut frame = Frame::new(RgbImage::new(100, 100), 0, 0);

  let report = pipeline(BlurConfig::default())
    .process(&model, &mut frame)
    .unwrap();

  assert_eq!(report.candidates, 2);
  assert_eq!(report.detections.len(), 1);
  assert_eq!(report.detections[0].confidence, 0.9);
  assert_eq!(report.detections[0].bbox, BBox::new(25, 25, 50, 50));
}

#[test]
fn inside_blur_only_touches_listed_labels() {
  let model = FixedModel::rows(&[
    // person: 10..40
    [0.25, 0.25, 0.3, 0.3, 1.0, 0.9, 0.1],
    // car: 60..90
    [0.75, 0.75, 0.3, 0.3, 1.0, 0.1, 0.8],
  ]);
  let blur = BlurConfig::new(BlurMode::Inside, 5, BlurrableLabels::parse("person")).unwrap();
  let original = checkerboard(100, 100);
  let mut frame = Frame::new(original.clone(), 0, 0);

  let report = pipeline(blur).process(&model, &mut frame).unwrap();

  assert_eq!(report.detections.len(), 2);
  assert_eq!(report.blurred, 1);
  // 人物框内部被模糊
  assert!(!region_equal(&frame.image, &original, 15..35, 15..35));
  // 车辆框内部与背景保持原样
  assert!(region_equal(&frame.image, &original, 65..85, 65..85));
  assert!(region_equal(&frame.image, &original, 45..55, 60..100));
  assert!(region_equal(&frame.image, &original, 0..8, 45..100));
}

#[test]
fn empty_detection_set_passes_frame_through() {
  let model = FixedModel(Vec::new());
  let original = checkerboard(32, 32);
  let mut frame = Frame::new(original.clone(), 0, 0);

  let report = pipeline(BlurConfig::default())
    .process(&model, &mut frame)
    .unwrap();

  assert!(report.detections.is_empty());
  assert_eq!(frame.image, original);
}

#[test]
fn empty_detection_set_keeps_frame_in_every_partial_mode() {
  let original = checkerboard(32, 32);
  for mode in [BlurMode::None, BlurMode::Inside, BlurMode::Outside] {
    let blur = BlurConfig::new(mode, 5, BlurrableLabels::default()).unwrap();
    let mut frame = Frame::new(original.clone(), 0, 0);

    let report = pipeline(blur)
      .process(&FixedModel(Vec::new()), &mut frame)
      .unwrap();

    assert!(report.detections.is_empty(), "{mode:?}");
    assert_eq!(report.blurred, 0, "{mode:?}");
    assert_eq!(frame.image, original, "{mode:?}");
  }
}

#[test]
fn full_blur_with_empty_model_blurs_every_pixel() {
  let blur = BlurConfig::new(BlurMode::Full, 5, BlurrableLabels::default()).unwrap();
  let original = checkerboard(32, 32);
  let mut frame = Frame::new(original.clone(), 0, 0);

  pipeline(blur)
    .process(&FixedModel(Vec::new()), &mut frame)
    .unwrap();

  assert!(
    frame
      .image
      .enumerate_pixels()
      .all(|(x, y, pixel)| pixel != original.get_pixel(x, y))
  );
}

#[test]
fn full_blur_without_detections_blurs_every_pixel() {
  let model = FixedModel::rows(&[[0.5, 0.5, 0.2, 0.2, 1.0, 0.1, 0.2]]);
  let blur = BlurConfig::new(BlurMode::Full, 5, BlurrableLabels::default()).unwrap();
  let original = checkerboard(32, 32);
  let mut frame = Frame::new(original.clone(), 0, 0);

  let report = pipeline(blur).process(&model, &mut frame).unwrap();

  assert!(report.detections.is_empty());
  assert!(
    frame
      .image
      .enumerate_pixels()
      .all(|(x, y, pixel)| pixel != original.get_pixel(x, y))
  );
}

#[test]
fn malformed_tensor_is_fatal() {
  let model = FixedModel(vec![
    RawOutput::from_rows(&[[0.5, 0.5, 0.2, 0.2, 1.0, 0.9]]).unwrap(),
  ]);
  let mut frame = Frame::new(RgbImage::new(16, 16), 3, 0);

  let error = pipeline(BlurConfig::default())
    .process(&model, &mut frame)
    .unwrap_err();
  assert!(error.to_string().contains('3'));
}
