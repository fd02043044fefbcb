// 该文件是 EdgeDemo 项目的一部分。
// src/inference/local.rs - 本地 llama-cli 推理
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
use std::process::Command;

use tracing::{debug, info};

use super::{Dispatch, InferenceError, InferenceRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  Windows,
  Other,
}

impl Platform {
  pub fn current() -> Self {
    if cfg!(windows) {
      Platform::Windows
    } else {
      Platform::Other
    }
  }
}

/// 在编译目录下查找 llama-cli
///
/// Windows 优先使用 `bin/Release/llama-cli.exe`，不存在时退回 `bin/llama-cli`。
pub fn resolve_main_path(build_dir: &Path, platform: Platform) -> PathBuf {
  let fallback = build_dir.join("bin").join("llama-cli");
  match platform {
    Platform::Windows => {
      let release = build_dir.join("bin").join("Release").join("llama-cli.exe");
      if release.exists() { release } else { fallback }
    }
    Platform::Other => fallback,
  }
}

/// 调用预编译的 llama-cli 执行一次推理，输出直接继承到终端
#[derive(Debug, Clone)]
pub struct LlamaCliRunner {
  main_path: PathBuf,
  model: PathBuf,
  threads: u32,
  conversation: bool,
}

impl LlamaCliRunner {
  pub fn new(build_dir: impl AsRef<Path>, model: impl Into<PathBuf>) -> Self {
    Self {
      main_path: resolve_main_path(build_dir.as_ref(), Platform::current()),
      model: model.into(),
      threads: 1,
      conversation: false,
    }
  }

  pub fn with_threads(mut self, threads: u32) -> Self {
    self.threads = threads;
    self
  }

  pub fn with_conversation(mut self, conversation: bool) -> Self {
    self.conversation = conversation;
    self
  }

  pub fn main_path(&self) -> &Path {
    &self.main_path
  }

  pub fn command_args(&self, request: &InferenceRequest<'_>) -> Vec<String> {
    let sampling = request.sampling;
    let mut args = vec![
      "-m".to_string(),
      self.model.display().to_string(),
      "-n".to_string(),
      sampling.n_predict.to_string(),
      "-t".to_string(),
      self.threads.to_string(),
      "-p".to_string(),
      request.prompt.to_string(),
      "-ngl".to_string(),
      "0".to_string(),
      "-c".to_string(),
      sampling.ctx_size.to_string(),
      "--temp".to_string(),
      sampling.temperature.to_string(),
      "-b".to_string(),
      "1".to_string(),
    ];
    if self.conversation {
      args.push("-cnv".to_string());
    }
    args
  }
}

impl Dispatch for LlamaCliRunner {
  fn dispatch(&self, request: &InferenceRequest<'_>) -> Result<Option<String>, InferenceError> {
    if !self.main_path.is_file() {
      return Err(InferenceError::BinaryNotFound(self.main_path.clone()));
    }

    let args = self.command_args(request);
    info!("启动 {}", self.main_path.display());
    debug!("参数: {:?}", args);

    let status = Command::new(&self.main_path)
      .args(&args)
      .status()
      .map_err(|source| InferenceError::SpawnFailed {
        path: self.main_path.clone(),
        source,
      })?;

    if !status.success() {
      return Err(InferenceError::ExitStatus(status));
    }
    Ok(None)
  }
}
