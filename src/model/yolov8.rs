// 该文件是 EdgeDemo 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 检测模型
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
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use ndarray::{Array4, ArrayD, ArrayViewD, Axis, Ix3};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, info};

use super::{CocoLabel, DetectItem, DetectResult, Model};
use crate::frame::Frame;

const YOLOV8_INPUT_W: u32 = 640;
const YOLOV8_INPUT_H: u32 = 640;
const YOLOV8_OUTPUT_NAME: &str = "output0";
const YOLOV8_BOX_ROWS: usize = 4;

pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型输出形状无效: {0:?}")]
  InvalidOutputShape(Vec<usize>),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

fn ort_error(e: impl std::fmt::Display) -> Yolov8Error {
  Yolov8Error::OrtError(e.to_string())
}

pub struct Yolov8Builder {
  model_path: PathBuf,
  confidence: f32,
  nms_threshold: f32,
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      confidence: DEFAULT_CONFIDENCE,
      nms_threshold: DEFAULT_NMS_THRESHOLD,
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn nms_threshold(mut self, nms_threshold: f32) -> Self {
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn build(self) -> Result<Yolov8, Yolov8Error> {
    if !self.model_path.is_file() {
      return Err(Yolov8Error::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()
      .map_err(ort_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ort_error)?
      .commit_from_file(&self.model_path)
      .map_err(ort_error)?;
    info!("模型加载完成");
    debug!(
      "置信度阈值: {}, NMS 阈值: {}",
      self.confidence, self.nms_threshold
    );

    Ok(Yolov8 {
      session: Mutex::new(session),
      confidence: self.confidence,
      nms_threshold: self.nms_threshold,
    })
  }
}

/// YOLOv8 检测模型
///
/// 输入为任意尺寸的 RGB 帧，输出框坐标已换算回原图像素坐标。
pub struct Yolov8 {
  // Session::run 需要可变引用
  session: Mutex<Session>,
  confidence: f32,
  nms_threshold: f32,
}

impl Yolov8 {
  fn run(&self, input: &Array4<f32>) -> Result<ArrayD<f32>, Yolov8Error> {
    let mut session = self
      .session
      .lock()
      .map_err(|_| Yolov8Error::SessionPoisoned)?;

    let tensor = TensorRef::from_array_view(input.view()).map_err(ort_error)?;
    let outputs = session.run(ort::inputs![tensor]).map_err(ort_error)?;

    let (shape, data) = outputs[YOLOV8_OUTPUT_NAME]
      .try_extract_tensor::<f32>()
      .map_err(ort_error)?;
    ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec()).map_err(ort_error)
  }
}

impl Model for Yolov8 {
  type Input = Frame;
  type Output = DetectResult<CocoLabel>;
  type Error = Yolov8Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = preprocess(input);

    debug!("执行模型推理");
    let output = self.run(&tensor)?;

    let scale_x = input.width() as f32 / YOLOV8_INPUT_W as f32;
    let scale_y = input.height() as f32 / YOLOV8_INPUT_H as f32;
    let candidates = decode_output(output.view(), self.confidence, scale_x, scale_y)?;
    let items = nms(candidates, self.nms_threshold);
    debug!("检测到 {} 个目标", items.len());

    Ok(DetectResult::from(items))
  }
}

/// 缩放到 640x640 并转为归一化的 NCHW 张量
fn preprocess(frame: &Frame) -> Array4<f32> {
  let resized = imageops::resize(
    &frame.image,
    YOLOV8_INPUT_W,
    YOLOV8_INPUT_H,
    FilterType::Triangle,
  );

  let mut input = Array4::zeros((1, 3, YOLOV8_INPUT_H as usize, YOLOV8_INPUT_W as usize));
  for (x, y, pixel) in resized.enumerate_pixels() {
    let (x, y) = (x as usize, y as usize);
    let [r, g, b] = pixel.0;
    input[[0, 0, y, x]] = r as f32 / 255.0;
    input[[0, 1, y, x]] = g as f32 / 255.0;
    input[[0, 2, y, x]] = b as f32 / 255.0;
  }
  input
}

/// 解析 `[1, 4 + 类别数, 候选数]` 的输出
///
/// 每列为 `cx, cy, w, h` 加各类别得分，取最高分类别，低于阈值的丢弃。
fn decode_output(
  output: ArrayViewD<'_, f32>,
  confidence: f32,
  scale_x: f32,
  scale_y: f32,
) -> Result<Vec<DetectItem<CocoLabel>>, Yolov8Error> {
  let shape = output.shape().to_vec();
  let output = output
    .into_dimensionality::<Ix3>()
    .map_err(|_| Yolov8Error::InvalidOutputShape(shape.clone()))?;
  if output.shape()[0] != 1 || output.shape()[1] <= YOLOV8_BOX_ROWS {
    return Err(Yolov8Error::InvalidOutputShape(shape));
  }

  let predictions = output.index_axis(Axis(0), 0);
  let mut items = Vec::new();

  for column in predictions.axis_iter(Axis(1)) {
    let best = column
      .iter()
      .skip(YOLOV8_BOX_ROWS)
      .copied()
      .enumerate()
      .max_by(|a, b| a.1.total_cmp(&b.1));
    let Some((class_id, score)) = best else {
      continue;
    };
    if score < confidence {
      continue;
    }

    let (cx, cy, w, h) = (column[0], column[1], column[2], column[3]);
    items.push(DetectItem {
      kind: CocoLabel::from_label_id(class_id as u32),
      score,
      bbox: [
        (cx - w / 2.0) * scale_x,
        (cy - h / 2.0) * scale_y,
        (cx + w / 2.0) * scale_x,
        (cy + h / 2.0) * scale_y,
      ],
    });
  }

  Ok(items)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = w * h;
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 按类别做非极大值抑制，结果按得分降序
fn nms(mut items: Vec<DetectItem<CocoLabel>>, threshold: f32) -> Vec<DetectItem<CocoLabel>> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem<CocoLabel>> = Vec::with_capacity(items.len());
  for item in items {
    let suppressed = kept
      .iter()
      .any(|k| k.kind == item.kind && iou(&k.bbox, &item.bbox) > threshold);
    if !suppressed {
      kept.push(item);
    }
  }
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};
  use ndarray::Array3;

  fn item(class: u32, score: f32, bbox: [f32; 4]) -> DetectItem<CocoLabel> {
    DetectItem {
      kind: CocoLabel::from_label_id(class),
      score,
      bbox,
    }
  }

  fn output_with(columns: &[(f32, f32, f32, f32, usize, f32)]) -> ArrayD<f32> {
    let mut output = Array3::<f32>::zeros((1, 84, columns.len()));
    for (i, &(cx, cy, w, h, class, score)) in columns.iter().enumerate() {
      output[[0, 0, i]] = cx;
      output[[0, 1, i]] = cy;
      output[[0, 2, i]] = w;
      output[[0, 3, i]] = h;
      output[[0, 4 + class, i]] = score;
    }
    output.into_dyn()
  }

  #[test]
  fn test_decode_output_filters_and_scales() {
    let output = output_with(&[
      (320.0, 320.0, 100.0, 200.0, 0, 0.9),
      (100.0, 100.0, 10.0, 10.0, 2, 0.1),
    ]);

    let items = decode_output(output.view(), 0.25, 0.5, 2.0).unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, CocoLabel::from_label_id(0));
    assert_eq!(items[0].bbox, [135.0, 440.0, 185.0, 840.0]);
    assert!((items[0].score - 0.9).abs() < f32::EPSILON);
  }

  #[test]
  fn test_decode_output_rejects_bad_shape() {
    let output = ArrayD::<f32>::zeros(vec![84, 10]);
    assert!(matches!(
      decode_output(output.view(), 0.25, 1.0, 1.0),
      Err(Yolov8Error::InvalidOutputShape(_))
    ));

    let output = ArrayD::<f32>::zeros(vec![1, 4, 10]);
    assert!(matches!(
      decode_output(output.view(), 0.25, 1.0, 1.0),
      Err(Yolov8Error::InvalidOutputShape(_))
    ));
  }

  #[test]
  fn test_nms_per_class() {
    let items = vec![
      item(0, 0.6, [10.0, 10.0, 50.0, 50.0]),
      item(0, 0.9, [12.0, 12.0, 52.0, 52.0]),
      // 不同类别不互相抑制
      item(16, 0.5, [10.0, 10.0, 50.0, 50.0]),
      item(0, 0.4, [200.0, 200.0, 240.0, 240.0]),
    ];

    let kept = nms(items, 0.45);

    assert_eq!(kept.len(), 3);
    assert!((kept[0].score - 0.9).abs() < f32::EPSILON);
    assert_eq!(kept[1].kind, CocoLabel::from_label_id(16));
    assert_eq!(kept[2].bbox, [200.0, 200.0, 240.0, 240.0]);
  }

  #[test]
  fn test_iou() {
    let a = [0.0, 0.0, 10.0, 10.0];
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    assert!((iou(&a, &[5.0, 0.0, 15.0, 10.0]) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn test_preprocess_normalizes() {
    let frame = Frame::from(RgbImage::from_pixel(100, 50, Rgb([255, 0, 51])));
    let input = preprocess(&frame);

    assert_eq!(input.shape(), &[1, 3, 640, 640]);
    assert!((input[[0, 0, 320, 320]] - 1.0).abs() < 1e-6);
    assert_eq!(input[[0, 1, 0, 0]], 0.0);
    assert!((input[[0, 2, 639, 639]] - 0.2).abs() < 1e-6);
  }

  #[test]
  fn test_missing_model_file() {
    let result = Yolov8Builder::new("/nonexistent/yolov8s.onnx").build();
    assert!(matches!(result, Err(Yolov8Error::ModelNotFound(_))));
  }
}
