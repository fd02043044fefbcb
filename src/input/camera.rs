// 该文件是 EdgeDemo 项目的一部分。
// src/input/camera.rs - V4L2 摄像头输入源
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

use std::pin::Pin;

use image::RgbImage;
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::{FrameSource, InputError};
use crate::frame::Frame;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const CAPTURE_BUFFERS: u32 = 4;

/// 摄像头输入源，默认使用设备 0
#[derive(Debug, Clone, Default)]
pub struct CameraSource {
  index: usize,
}

impl FrameSource for CameraSource {
  type Frames = CameraFrames;

  /// 打开设备并准备采集 `count` 帧，每次调用都会重新打开设备
  fn generate(&mut self, count: usize) -> Result<Self::Frames, InputError> {
    CameraFrames::open(self.index, count)
  }
}

/// 摄像头帧序列
///
/// 序列持有设备。采集完 `count` 次或序列被丢弃时释放设备。
pub struct CameraFrames {
  /// 捕获流（生命周期与 device 关联）
  stream: Option<Stream<'static>>,
  /// V4L2 设备（使用 Pin<Box> 固定内存位置）
  device: Option<Pin<Box<Device>>>,
  fourcc: FourCC,
  width: u32,
  height: u32,
  /// 剩余采集次数
  remaining: usize,
  index: u64,
}

impl CameraFrames {
  fn open(index: usize, count: usize) -> Result<Self, InputError> {
    let camera_error = |e: std::io::Error| InputError::CameraError(e.to_string());

    let device = Box::pin(Device::new(index).map_err(camera_error)?);

    let mut format = device.format().map_err(camera_error)?;
    format.width = CAPTURE_WIDTH;
    format.height = CAPTURE_HEIGHT;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format).map_err(camera_error)?;

    info!(
      "摄像头 {} 已打开: {}x{} {}",
      index, format.width, format.height, format.fourcc
    );

    // SAFETY: device 被 Pin<Box> 固定在堆上，不会移动；
    // stream 在 release 中先于 device 被丢弃
    let stream = unsafe {
      let device_ref: &Device = &device;
      let device_static: &'static Device = std::mem::transmute(device_ref);
      Stream::with_buffers(device_static, Type::VideoCapture, CAPTURE_BUFFERS)
        .map_err(camera_error)?
    };

    Ok(Self {
      stream: Some(stream),
      device: Some(device),
      fourcc: format.fourcc,
      width: format.width,
      height: format.height,
      remaining: count,
      index: 0,
    })
  }

  fn release(&mut self) {
    // 确保 stream 在 device 之前被 drop
    if self.stream.take().is_some() {
      debug!("释放摄像头");
    }
    self.device.take();
  }
}

impl Drop for CameraFrames {
  fn drop(&mut self) {
    self.release();
  }
}

impl Iterator for CameraFrames {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let (fourcc, width, height) = (self.fourcc, self.width, self.height);

    while self.remaining > 0 {
      self.remaining -= 1;

      let stream = self.stream.as_mut()?;
      let captured = stream
        .next()
        .map_err(|e| e.to_string())
        .and_then(|(buffer, _meta)| decode_buffer(fourcc, width, height, buffer));

      match captured {
        Ok(image) => {
          let frame = Frame::new(image, self.index);
          self.index += 1;
          if self.remaining == 0 {
            self.release();
          }
          return Some(frame);
        }
        Err(e) => {
          warn!("无法采集摄像头帧: {}", e);
        }
      }
    }

    self.release();
    None
  }
}

fn decode_buffer(fourcc: FourCC, width: u32, height: u32, buffer: &[u8]) -> Result<RgbImage, String> {
  if fourcc == FourCC::new(b"MJPG") {
    return image::load_from_memory(buffer)
      .map(|image| image.to_rgb8())
      .map_err(|e| e.to_string());
  }

  let rgb = yuyv_to_rgb(buffer, width, height);
  RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
    format!(
      "缓冲区大小不匹配: {} 字节, 期望 {}x{} YUYV",
      buffer.len(),
      width,
      height
    )
  })
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}
