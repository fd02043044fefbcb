// 该文件是 EdgeDemo 项目的一部分。
// src/input/directory.rs - 图片目录输入源
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use tracing::{debug, error, info, warn};

use super::{FrameSource, InputError};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// 按扩展名判断是否为图片文件（不区分大小写）
pub fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

/// 读取并解码一张图片
pub fn load_image(path: &Path) -> Result<RgbImage, InputError> {
  let load = || -> Result<RgbImage, image::ImageError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8())
  };

  load().map_err(|source| InputError::ImageLoadError {
    path: path.to_path_buf(),
    source,
  })
}

/// 图片目录输入源
///
/// 每次 `generate` 都会重新列出目录，因此可以重复使用。
#[derive(Debug, Clone)]
pub struct DirectorySource {
  path: PathBuf,
}

impl DirectorySource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// 按文件名排序列出目录中的图片文件
  pub fn list_images(&self) -> Result<Vec<PathBuf>, InputError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&self.path)? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        files.push(path);
      }
    }
    files.sort();
    Ok(files)
  }

  pub(super) fn ensure_images(&self) -> Result<Vec<PathBuf>, InputError> {
    let files = self.list_images()?;
    if files.is_empty() {
      warn!("目录中没有找到图片文件: {}", self.path.display());
      return Err(InputError::NoImages(self.path.clone()));
    }
    Ok(files)
  }
}

impl FrameSource for DirectorySource {
  type Frames = DirectoryFrames;

  // 目录模式不受 count 限制
  fn generate(&mut self, _count: usize) -> Result<Self::Frames, InputError> {
    let files = self.ensure_images()?;
    info!(
      "在 {} 中找到 {} 个图片文件",
      self.path.display(),
      files.len()
    );

    Ok(DirectoryFrames {
      files: files.into_iter(),
      index: 0,
    })
  }
}

pub struct DirectoryFrames {
  files: std::vec::IntoIter<PathBuf>,
  index: u64,
}

impl Iterator for DirectoryFrames {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match load_image(&path) {
        Ok(image) => {
          debug!("读取图片: {}", path.display());
          let frame = Frame::new(image, self.index);
          self.index += 1;
          return Some(frame);
        }
        Err(e) => {
          error!("{}", e);
          continue;
        }
      }
    }
    None
  }
}
