// 该文件是 EdgeDemo 项目的一部分。
// src/task.rs - 任务
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
use std::time::Instant;

use tracing::info;

use crate::{
  crop::Crop,
  detector::PeopleDetector,
  frame::Frame,
  inference::{InferenceDispatcher, Sampling},
  input::FrameSource,
  model::{DetectResult, Model, WithLabel},
  output::{OutputError, Render, save_crops},
};

pub trait Task<S, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, source: S, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 推理阶段的参数
pub struct InferencePlan {
  pub dispatcher: InferenceDispatcher,
  pub prompt: String,
  pub sampling: Sampling,
}

#[derive(Debug, Default)]
pub struct PeopleReport {
  pub people_counter: usize,
  pub frames: usize,
  pub crops: Vec<Crop>,
  pub saved_crops: Vec<PathBuf>,
  /// `(人物编号, 回答)`
  pub descriptions: Vec<(usize, String)>,
}

/// 检测、裁剪，然后按需保存裁剪图并执行推理
#[derive(Default)]
pub struct PeopleTask {
  count: usize,
  crops_dir: Option<PathBuf>,
  inference: Option<InferencePlan>,
}

impl PeopleTask {
  pub fn new(count: usize) -> Self {
    Self {
      count,
      ..Default::default()
    }
  }

  pub fn with_crops_dir(mut self, crops_dir: Option<PathBuf>) -> Self {
    self.crops_dir = crops_dir;
    self
  }

  pub fn with_inference(mut self, inference: Option<InferencePlan>) -> Self {
    self.inference = inference;
    self
  }
}

impl<S, M, T, ME, O> Task<S, M, O> for PeopleTask
where
  S: FrameSource,
  M: Model<Input = Frame, Output = DetectResult<T>, Error = ME>,
  T: WithLabel,
  ME: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, DetectResult<T>, Error = OutputError>,
{
  type Output = PeopleReport;
  type Error = anyhow::Error;

  fn run_task(self, mut source: S, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let now = Instant::now();
    let detector = PeopleDetector::new(model);
    let detection = detector.detect_and_render(&mut source, self.count, &output)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    println!("\nNumber of people recognized = {}", detection.people_counter);

    let saved_crops = match self.crops_dir.as_ref() {
      Some(directory) => save_crops(&detection.crops, directory)?,
      None => Vec::new(),
    };

    let descriptions = match self.inference.as_ref() {
      Some(plan) => {
        let now = Instant::now();
        let descriptions = plan.dispatcher.dispatch_crops(
          &detection.crops,
          &plan.prompt,
          plan.sampling,
          |person, text| println!("Person {}: {}", person, text),
        )?;
        info!("推理完成，耗时: {:.2?}", now.elapsed());
        descriptions
      }
      None => Vec::new(),
    };

    info!("任务完成");
    Ok(PeopleReport {
      people_counter: detection.people_counter,
      frames: detection.frames,
      crops: detection.crops,
      saved_crops,
      descriptions,
    })
  }
}
