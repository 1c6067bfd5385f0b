// 该文件是 Mengsha （蒙纱） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 以固定帧率和固定尺寸把处理后的帧编码为视频文件。
//!
//! ## URL Scheme
//!
//! `gst:///output.mp4?fps=25&width=640&height=360`
//!
//! - `fps`: 帧率，默认 25
//! - `width` / `height`: 视频尺寸，默认 640x360；尺寸不一致的帧会被缩放
//!
//! 容器按扩展名选择：`.mp4`、`.mkv`、`.avi`（MJPEG）、`.webm`，其余按 MP4 处理。

use std::sync::atomic::{AtomicU64, Ordering};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameSize},
  output::Render,
};

const DEFAULT_FPS: i32 = 25;

#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("管道中找不到 appsrc")]
  AppSrcNotFound,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("管道状态切换错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("无效的视频参数: {0}")]
  InvalidParameter(String),
}

pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  size: FrameSize,
  fps: i32,
  frame_count: AtomicU64,
}

impl FromUrlWithScheme for GStreamerVideoOutput {
  const SCHEME: &'static str = "gst";
}

fn pipeline_description(path: &str) -> String {
  let encoder = if path.ends_with(".mkv") {
    "video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! matroskamux"
  } else if path.ends_with(".avi") {
    "jpegenc ! avimux"
  } else if path.ends_with(".webm") {
    "vp8enc ! webmmux"
  } else {
    "video/x-raw,format=I420 ! x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux"
  };
  format!(
    "appsrc name=src ! videoconvert ! {} ! filesink location={}",
    encoder, path
  )
}

impl FromUrl for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerVideoOutputError::SchemeMismatch(
        url.scheme().to_string(),
      ));
    }

    gst::init()?;

    let size = FrameSize::from_query(url);
    if size.is_empty() {
      return Err(GStreamerVideoOutputError::InvalidParameter(format!(
        "尺寸 {}x{}",
        size.width, size.height
      )));
    }
    let fps = url
      .query_pairs()
      .find(|(k, _)| k == "fps")
      .and_then(|(_, v)| v.parse().ok())
      .unwrap_or(DEFAULT_FPS);
    if fps <= 0 {
      return Err(GStreamerVideoOutputError::InvalidParameter(format!(
        "帧率 {}",
        fps
      )));
    }

    let description = pipeline_description(url.path());
    info!("创建视频输出管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerVideoOutputError::PipelineError("无法创建管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcNotFound)?;

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", size.width as i32)
      .field("height", size.height as i32)
      .field("framerate", gst::Fraction::new(fps, 1))
      .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    info!(
      "视频输出已就绪: {}x{} @ {} fps -> {}",
      size.width,
      size.height,
      fps,
      url.path()
    );

    Ok(Self {
      pipeline,
      appsrc,
      size,
      fps,
      frame_count: AtomicU64::new(0),
    })
  }
}

impl GStreamerVideoOutput {
  fn push_frame(&self, data: &[u8]) -> Result<(), GStreamerVideoOutputError> {
    let mut buffer = gst::Buffer::from_slice(data.to_vec());

    let index = self.frame_count.fetch_add(1, Ordering::Relaxed);
    let frame_ns = 1_000_000_000 / self.fps as u64;
    if let Some(buffer_ref) = buffer.get_mut() {
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(index * frame_ns));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));
    }

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(|e| GStreamerVideoOutputError::PipelineError(format!("推送缓冲区失败: {:?}", e)))?;

    Ok(())
  }
}

impl Render for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn render(&self, frame: &Frame) -> Result<(), Self::Error> {
    let image = self.size.fit(frame.image.clone());
    self.push_frame(image.as_raw())
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    // EOS 之后容器才会写完索引
    let _ = self.appsrc.end_of_stream();
    if let Some(bus) = self.pipeline.bus() {
      let _ = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(5),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
    }

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("停止视频输出管道失败: {}", e);
    }

    info!(
      "视频输出已关闭，共写入 {} 帧",
      self.frame_count.load(Ordering::Relaxed)
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn container_follows_extension() {
    assert!(pipeline_description("/tmp/a.avi").contains("avimux"));
    assert!(pipeline_description("/tmp/a.mkv").contains("matroskamux"));
    assert!(pipeline_description("/tmp/a.webm").contains("webmmux"));
    assert!(pipeline_description("/tmp/a.mov").contains("mp4mux"));
    assert!(pipeline_description("/tmp/a.mp4").ends_with("filesink location=/tmp/a.mp4"));
  }
}
