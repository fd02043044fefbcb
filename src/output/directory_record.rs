// 该文件是 EdgeDemo 项目的一部分。
// src/output/directory_record.rs - 按日期归档的标注图片输出
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

use std::cell::Cell;
use std::path::PathBuf;

use chrono::{Datelike, Utc};
use tracing::debug;

use super::{
  OutputError, Render,
  draw::{Draw, Record},
};
use crate::{
  frame::Frame,
  model::{DetectResult, WithLabel},
};

/// 将标注后的帧保存为 `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.jpg`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: Option<Record>,
  frame_counter: Cell<u16>,
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      draw: Draw::default(),
      record: None,
      frame_counter: Cell::new(0),
    }
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  /// 同时写入 `.txt` 检测记录
  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record.then_some(Record);
    self
  }

  fn frame_id(&self) -> u16 {
    let id = self.frame_counter.get().wrapping_add(1);
    self.frame_counter.set(id);
    id
  }

  fn frame_path(&self) -> Result<PathBuf, OutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.jpg",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl<T: WithLabel> Render<Frame, DetectResult<T>> for DirectoryRecordOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult<T>) -> Result<(), Self::Error> {
    let path = self.frame_path()?;

    let mut image = frame.image.clone();
    self.draw.draw_detections(&mut image, result);
    image.save(&path)?;
    if let Some(record) = self.record.as_ref() {
      record.record(result, &path)?;
    }

    debug!("保存标注图片: {}", path.display());
    Ok(())
  }
}
