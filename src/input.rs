// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/input.rs - 视频/图像输入
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

//! 帧来源。每个来源都是 `Iterator<Item = Result<Frame, InputError>>`，
//! 返回 `None` 表示流结束，单帧读取失败以 `Some(Err(..))` 报告。
//! 所有来源都会把帧缩放到 URL 查询参数 `width` / `height` 指定的处理尺寸。

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

#[cfg(any(
  feature = "read_image_file",
  feature = "directory_input",
  feature = "v4l2_input"
))]
use crate::FromUrlWithScheme;
use crate::{FromUrl, frame::Frame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::ImageFileInput;

#[cfg(feature = "directory_input")]
mod directory_input;
#[cfg(feature = "directory_input")]
pub use self::directory_input::DirectoryInput;

#[cfg(feature = "v4l2_input")]
mod v4l2_input;
#[cfg(feature = "v4l2_input")]
pub use self::v4l2_input::V4l2Input;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("输入 URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("图像读取错误: {0}")]
  Image(#[from] image::ImageError),
  #[error("处理尺寸不能为零: {width}x{height}")]
  EmptySize { width: u32, height: u32 },
  #[error("目录中没有可读取的图像: {}", .0.display())]
  EmptyDirectory(PathBuf),
  #[error("摄像头采集错误: {0}")]
  Capture(String),
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "directory_input")]
  Directory(DirectoryInput),
  #[cfg(feature = "v4l2_input")]
  V4l2(Box<V4l2Input>),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "read_image_file")]
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      #[cfg(feature = "directory_input")]
      DirectoryInput::SCHEME => Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?)),
      #[cfg(feature = "v4l2_input")]
      V4l2Input::SCHEME => Ok(InputWrapper::V4l2(Box::new(V4l2Input::from_url(url)?))),
      scheme => Err(InputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "directory_input")]
      InputWrapper::Directory(input) => input.next(),
      #[cfg(feature = "v4l2_input")]
      InputWrapper::V4l2(input) => input.next(),
    }
  }
}
