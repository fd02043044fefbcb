// 该文件是 EdgeDemo 项目的一部分。
// src/output/draw.rs - 检测框绘制与记录
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::info;

use super::OutputError;
use crate::model::{DetectItem, DetectResult, WithLabel};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const PERSON_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const OTHER_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色

/// 在图像上绘制检测框
///
/// 未配置字体时只画框，不画标签。
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  person_color: [u8; 3],
  other_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      person_color: PERSON_COLOR,
      other_color: OTHER_COLOR,
    }
  }
}

impl Draw {
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, OutputError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|e| OutputError::FontError(e.to_string()))?;
    info!("加载标签字体: {}", path.display());
    self.font = Some(font);
    Ok(self)
  }

  pub fn draw_detections<T: WithLabel>(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.iter() {
      let color = if item.is_person() {
        self.person_color
      } else {
        self.other_color
      };
      self.draw_bbox_with_label(image, item, color);
    }
  }

  // bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(
    &self,
    image: &mut RgbImage,
    item: &DetectItem<T>,
    color: [u8; 3],
  ) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (item.bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (item.bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (item.bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (item.bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框加粗为 2 像素，向内收缩
    for thickness in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * thickness + 1;
      let height = y_max - y_min - 2 * thickness + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    let label = format!("{} {:.2}", item.kind.to_label_str(), item.score);
    let text_width = (label.len() as f32 * self.label_char_width) as i32;
    let label_x = x_min;
    let label_y = (y_min - self.label_text_height).max(0);

    // 确保标签不超出图像边界
    let label_width = text_width.min(w - label_x);
    if label_width <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, self.label_text_height as u32);
    draw_filled_rect_mut(image, rect, Rgb(color));
    draw_text_mut(
      image,
      Rgb([255u8, 255u8, 255u8]),
      label_x,
      label_y + self.label_text_vertical_padding,
      PxScale::from(self.font_size),
      font,
      &label,
    );
  }
}

/// 检测结果文本记录，每行 `label, score, x1, y1, x2, y2`
#[derive(Debug, Default, Clone, Copy)]
pub struct Record;

impl Record {
  pub fn format<T: WithLabel>(&self, result: &DetectResult<T>) -> String {
    result
      .iter()
      .map(|item| {
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          item.kind.to_label_str(),
          item.score,
          item.bbox[0],
          item.bbox[1],
          item.bbox[2],
          item.bbox[3]
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  /// 写入与图片同名的 `.txt` 文件
  pub fn record<T: WithLabel>(
    &self,
    result: &DetectResult<T>,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(result))
  }
}
