// 该文件是 EdgeDemo 项目的一部分。
// src/detector.rs - 人物检测与裁剪
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

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  crop::{Crop, crop_detection},
  frame::Frame,
  input::{FrameSource, InputError},
  model::{DetectResult, Model, WithLabel},
  output::{NoRender, OutputError, Render},
};

#[derive(Error, Debug)]
pub enum DetectError<E: std::error::Error + 'static> {
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("模型推理错误: {0}")]
  Model(#[source] E),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
}

impl<E: std::error::Error + 'static> DetectError<E> {
  pub fn input_error(&self) -> Option<&InputError> {
    match self {
      DetectError::Input(e) => Some(e),
      _ => None,
    }
  }
}

/// 一次检测的结果
#[derive(Debug, Default)]
pub struct PeopleDetection {
  pub people_counter: usize,
  pub crops: Vec<Crop>,
  pub frames: usize,
}

/// 人物检测器
///
/// 对每一帧运行一次模型，标签为 `person` 的检测框被计数并裁剪。
pub struct PeopleDetector<M> {
  model: M,
}

impl<M> PeopleDetector<M> {
  pub fn new(model: M) -> Self {
    Self { model }
  }
}

impl<M, T, E> PeopleDetector<M>
where
  M: Model<Input = Frame, Output = DetectResult<T>, Error = E>,
  T: WithLabel,
  E: std::error::Error + 'static,
{
  /// 最多处理 `count` 帧，返回人物数量与裁剪图
  pub fn detect<S: FrameSource>(
    &self,
    source: &mut S,
    count: usize,
  ) -> Result<PeopleDetection, DetectError<E>> {
    self.detect_and_render(source, count, &NoRender)
  }

  /// 与 [`Self::detect`] 相同，并把每帧的完整检测结果交给 `render`
  pub fn detect_and_render<S, R>(
    &self,
    source: &mut S,
    count: usize,
    render: &R,
  ) -> Result<PeopleDetection, DetectError<E>>
  where
    S: FrameSource,
    R: Render<Frame, DetectResult<T>, Error = OutputError>,
  {
    let mut detection = PeopleDetection::default();

    for frame in source.generate(count)?.take(count) {
      let now = Instant::now();
      let result = self.model.infer(&frame).map_err(DetectError::Model)?;
      let elapsed = now.elapsed();
      debug!(
        "第 {} 帧推理完成，耗时: {:.2?}，检测到 {} 个目标",
        frame.index,
        elapsed,
        result.len()
      );

      for item in result.iter().filter(|item| item.is_person()) {
        detection.people_counter += 1;
        detection.crops.push(crop_detection(&frame, &item.bbox));
      }

      render.render_result(&frame, &result)?;
      detection.frames += 1;
    }

    info!(
      "处理 {} 帧，识别到 {} 人",
      detection.frames, detection.people_counter
    );
    Ok(detection)
  }
}
