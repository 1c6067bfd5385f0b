// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/input/v4l2_input.rs - V4L2 摄像头输入
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

use std::time::Instant;

use image::RgbImage;
use tracing::{error, info};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameSize},
  input::InputError,
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const BUFFER_COUNT: u32 = 4;

/// V4L2 摄像头，采集格式固定为 YUYV
///
/// `v4l2:///dev/video0?width=640&height=360`
pub struct V4l2Input {
  // 映射缓冲区持有设备句柄，device 仅用于保持设备打开
  _device: Device,
  stream: Stream<'static>,
  capture_width: u32,
  capture_height: u32,
  size: FrameSize,
  index: u64,
  started: Instant,
}

impl FromUrlWithScheme for V4l2Input {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Input {
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

    let size = FrameSize::from_query(url);
    if size.is_empty() {
      return Err(InputError::EmptySize {
        width: size.width,
        height: size.height,
      });
    }

    let device_path = match url.path() {
      "" | "/" => DEFAULT_DEVICE,
      path => path,
    };
    Self::open(device_path, size)
  }
}

impl V4l2Input {
  pub fn open(device_path: &str, size: FrameSize) -> Result<Self, InputError> {
    info!("打开摄像头: {}", device_path);
    let device = Device::with_path(device_path)?;

    let mut format = device.format()?;
    format.width = size.width;
    format.height = size.height;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;
    if format.fourcc != FourCC::new(b"YUYV") {
      return Err(InputError::Capture(format!(
        "设备不支持 YUYV 格式，实际格式: {}",
        format.fourcc
      )));
    }
    info!("摄像头采集尺寸: {}x{}", format.width, format.height);

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;

    Ok(Self {
      _device: device,
      stream,
      capture_width: format.width,
      capture_height: format.height,
      size,
      index: 0,
      started: Instant::now(),
    })
  }
}

/// YUYV (4:2:2) 转 RGB，每 4 字节对应两个像素
pub fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

  for chunk in yuyv.chunks_exact(4) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;
    for y in [chunk[0] as f32, chunk[2] as f32] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

impl Iterator for V4l2Input {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let (buffer, _meta) = match self.stream.next() {
      Ok(captured) => captured,
      Err(e) => return Some(Err(InputError::Capture(e.to_string()))),
    };

    let expected = (self.capture_width * self.capture_height * 2) as usize;
    if buffer.len() < expected {
      return Some(Err(InputError::Capture(format!(
        "缓冲区大小不足: 需要 {}，实际 {}",
        expected,
        buffer.len()
      ))));
    }

    let rgb = yuyv_to_rgb(&buffer[..expected]);
    let Some(image) = RgbImage::from_raw(self.capture_width, self.capture_height, rgb) else {
      return Some(Err(InputError::Capture("无法创建 RGB 图像".to_string())));
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
