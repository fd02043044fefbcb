// 该文件是 EdgeDemo 项目的一部分。
// src/output/crop_writer.rs - 保存人物裁剪图
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

use tracing::{info, warn};

use super::OutputError;
use crate::crop::Crop;

/// 将裁剪图保存为 `person-0001.png` ...，编号从 1 开始，面积为零的跳过
pub fn save_crops(crops: &[Crop], directory: &Path) -> Result<Vec<PathBuf>, OutputError> {
  std::fs::create_dir_all(directory)?;

  let mut saved = Vec::with_capacity(crops.len());
  for (i, crop) in crops.iter().enumerate() {
    if crop.is_empty() {
      warn!("跳过面积为零的裁剪图 {}", i + 1);
      continue;
    }
    let path = directory.join(format!("person-{:04}.png", i + 1));
    crop.image.save(&path)?;
    saved.push(path);
  }

  info!("保存 {} 张裁剪图到 {}", saved.len(), directory.display());
  Ok(saved)
}
