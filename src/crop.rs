// 该文件是 EdgeDemo 项目的一部分。
// src/crop.rs - 检测框裁剪
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

use image::RgbImage;
use tracing::warn;

use crate::frame::Frame;

/// 从帧中裁剪出的人物图像
#[derive(Debug, Clone)]
pub struct Crop {
  /// 裁剪后的图像
  pub image: RgbImage,
  /// 来源帧索引
  pub frame_index: u64,
  /// 实际使用的像素框 [x1, y1, x2, y2]
  pub bbox: [u32; 4],
}

impl Crop {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

/// 将浮点检测框转换为整数像素框
///
/// 坐标向零截断，再限制在 `[0, width] x [0, height]` 内，
/// 且保证 `x2 >= x1`、`y2 >= y1`。
pub fn pixel_box(bbox: &[f32; 4], width: u32, height: u32) -> [u32; 4] {
  let clamp = |value: f32, max: u32| (value as i64).clamp(0, max as i64) as u32;

  let x1 = clamp(bbox[0], width);
  let y1 = clamp(bbox[1], height);
  let x2 = clamp(bbox[2], width).max(x1);
  let y2 = clamp(bbox[3], height).max(y1);

  [x1, y1, x2, y2]
}

/// 按检测框裁剪一帧
pub fn crop_detection(frame: &Frame, bbox: &[f32; 4]) -> Crop {
  let [x1, y1, x2, y2] = pixel_box(bbox, frame.width(), frame.height());

  if x2 == x1 || y2 == y1 {
    warn!(
      "帧 {} 的检测框 {:?} 裁剪后面积为零",
      frame.index, bbox
    );
  }

  let image = image::imageops::crop_imm(&frame.image, x1, y1, x2 - x1, y2 - y1).to_image();

  Crop {
    image,
    frame_index: frame.index,
    bbox: [x1, y1, x2, y2],
  }
}
