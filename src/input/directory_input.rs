// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/input/directory_input.rs - 图像目录输入
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
  time::Instant,
};

use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameSize},
  input::InputError,
};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// 按文件名顺序读取目录中的图像，每个文件一帧
pub struct DirectoryInput {
  pending: VecDeque<PathBuf>,
  size: FrameSize,
  index: u64,
  started: Instant,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
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

    Self::new(url.path(), FrameSize::from_query(url))
  }
}

impl DirectoryInput {
  pub fn new(directory: impl AsRef<Path>, size: FrameSize) -> Result<Self, InputError> {
    let directory = directory.as_ref();
    if size.is_empty() {
      return Err(InputError::EmptySize {
        width: size.width,
        height: size.height,
      });
    }

    let mut files = std::fs::read_dir(directory)?
      .map(|entry| entry.map(|entry| entry.path()))
      .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| is_image_file(path));
    files.sort();

    if files.is_empty() {
      return Err(InputError::EmptyDirectory(directory.to_path_buf()));
    }
    info!("图像目录 {} 中共 {} 个文件", directory.display(), files.len());

    Ok(Self {
      pending: files.into(),
      size,
      index: 0,
      started: Instant::now(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.pending.pop_front()?;
    debug!("读取帧: {}", path.display());

    let image = match image::open(&path) {
      Ok(image) => image.to_rgb8(),
      Err(e) => return Some(Err(e.into())),
    };

    let frame = Frame::new(
      self.size.fit(image),
      self.index,
      self.started.elapsed().as_millis() as u64,
    );
    self.index += 1;
    Some(Ok(frame))
  }
}
