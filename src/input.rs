// 该文件是 EdgeDemo 项目的一部分。
// src/input.rs - 图像/摄像头输入
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

use std::path::PathBuf;
use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tracing::warn;

use crate::frame::Frame;

mod directory;
pub use self::directory::{DirectoryFrames, DirectorySource, is_image_file, load_image};

#[cfg(feature = "v4l_input")]
mod camera;
#[cfg(feature = "v4l_input")]
pub use self::camera::{CameraFrames, CameraSource};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("目录中没有找到图片文件: {0}")]
  NoImages(PathBuf),
  #[error("无法加载图片 {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[cfg(feature = "v4l_input")]
  #[error("摄像头错误: {0}")]
  CameraError(String),
  #[cfg(not(feature = "v4l_input"))]
  #[error("当前构建未启用摄像头输入")]
  CameraUnsupported,
}

/// 帧来源
///
/// `generate` 返回一个按需拉取的有限帧序列。
pub trait FrameSource {
  type Frames: Iterator<Item = Frame>;

  fn generate(&mut self, count: usize) -> Result<Self::Frames, InputError>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
  type Frames = S::Frames;

  fn generate(&mut self, count: usize) -> Result<Self::Frames, InputError> {
    (**self).generate(count)
  }
}

/// 按运行模式选择的输入源
pub enum ImageLoader {
  Directory(DirectorySource),
  #[cfg(feature = "v4l_input")]
  Camera(CameraSource),
}

impl ImageLoader {
  pub fn new(image_path: impl Into<PathBuf>, realtime: bool) -> Result<Self, InputError> {
    if realtime {
      #[cfg(feature = "v4l_input")]
      return Ok(ImageLoader::Camera(CameraSource::default()));
      #[cfg(not(feature = "v4l_input"))]
      return Err(InputError::CameraUnsupported);
    }

    Ok(ImageLoader::Directory(DirectorySource::new(image_path)))
  }

  /// 在加载模型之前检查输入源是否可用
  ///
  /// 目录模式下目录里没有图片文件时返回 [`InputError::NoImages`]。
  pub fn check(&self) -> Result<(), InputError> {
    match self {
      ImageLoader::Directory(source) => source.ensure_images().map(|_| ()),
      #[cfg(feature = "v4l_input")]
      ImageLoader::Camera(_) => Ok(()),
    }
  }
}

pub enum LoaderFrames {
  Directory(DirectoryFrames),
  #[cfg(feature = "v4l_input")]
  Camera(CameraFrames),
}

impl Iterator for LoaderFrames {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      LoaderFrames::Directory(frames) => frames.next(),
      #[cfg(feature = "v4l_input")]
      LoaderFrames::Camera(frames) => frames.next(),
    }
  }
}

impl FrameSource for ImageLoader {
  type Frames = LoaderFrames;

  fn generate(&mut self, count: usize) -> Result<Self::Frames, InputError> {
    match self {
      ImageLoader::Directory(source) => source.generate(count).map(LoaderFrames::Directory),
      #[cfg(feature = "v4l_input")]
      ImageLoader::Camera(source) => source.generate(count).map(LoaderFrames::Camera),
    }
  }
}

/// 可被中断的输入源，停止标志置位后序列立即结束
pub struct Interruptible<S> {
  inner: S,
  stop: Arc<AtomicBool>,
}

impl<S> Interruptible<S> {
  pub fn new(inner: S, stop: Arc<AtomicBool>) -> Self {
    Self { inner, stop }
  }
}

impl<S: FrameSource> FrameSource for Interruptible<S> {
  type Frames = InterruptibleFrames<S::Frames>;

  fn generate(&mut self, count: usize) -> Result<Self::Frames, InputError> {
    Ok(InterruptibleFrames {
      inner: Some(self.inner.generate(count)?),
      stop: self.stop.clone(),
    })
  }
}

pub struct InterruptibleFrames<I> {
  inner: Option<I>,
  stop: Arc<AtomicBool>,
}

impl<I: Iterator<Item = Frame>> Iterator for InterruptibleFrames<I> {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.stop.load(Ordering::SeqCst) {
      // 丢弃内部序列，摄像头随之释放
      if self.inner.take().is_some() {
        warn!("收到中断信号，停止读取帧");
      }
      return None;
    }
    self.inner.as_mut()?.next()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  struct CountingSource;

  impl FrameSource for CountingSource {
    type Frames = std::vec::IntoIter<Frame>;

    fn generate(&mut self, count: usize) -> Result<Self::Frames, InputError> {
      Ok(
        (0..count as u64)
          .map(|index| Frame::new(RgbImage::new(2, 2), index))
          .collect::<Vec<_>>()
          .into_iter(),
      )
    }
  }

  #[test]
  fn test_interruptible_stops_after_flag() {
    let stop = Arc::new(AtomicBool::new(false));
    let mut source = Interruptible::new(CountingSource, stop.clone());
    let mut frames = source.generate(5).unwrap();

    assert_eq!(frames.next().map(|f| f.index), Some(0));
    assert_eq!(frames.next().map(|f| f.index), Some(1));
    stop.store(true, Ordering::SeqCst);
    assert!(frames.next().is_none());
    assert!(frames.next().is_none());
  }

  #[test]
  fn test_interruptible_passes_through() {
    let stop = Arc::new(AtomicBool::new(false));
    let mut source = Interruptible::new(CountingSource, stop);

    assert_eq!(source.generate(3).unwrap().count(), 3);
    // 可重复生成
    assert_eq!(source.generate(2).unwrap().count(), 2);
  }

  #[test]
  fn test_loader_directory_mode() {
    let loader = ImageLoader::new("data/images", false).unwrap();
    assert!(matches!(loader, ImageLoader::Directory(_)));
  }
}
