// 该文件是 EdgeDemo 项目的一部分。
// src/inference.rs - 大模型推理分发
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

use image::RgbImage;
use thiserror::Error;
use tracing::info;
#[cfg(feature = "remote_inference")]
use tracing::warn;

use crate::crop::Crop;

mod local;
pub use self::local::{LlamaCliRunner, Platform, resolve_main_path};

#[cfg(feature = "remote_inference")]
mod remote;
#[cfg(feature = "remote_inference")]
pub use self::remote::{REMOTE_QUESTION, REMOTE_SYSTEM_PROMPT, VisionClient, encode_png_base64};

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("找不到推理程序: {0}")]
  BinaryNotFound(PathBuf),
  #[error("无法启动推理程序 {path}: {source}")]
  SpawnFailed {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("推理程序异常退出: {0}")]
  ExitStatus(std::process::ExitStatus),
  #[cfg(feature = "remote_inference")]
  #[error("HTTP 请求错误: {0}")]
  Http(#[from] reqwest::Error),
  #[cfg(feature = "remote_inference")]
  #[error("API 地址无效: {0}")]
  InvalidEndpoint(#[from] url::ParseError),
  #[error("图像编码错误: {0}")]
  Encode(#[from] image::ImageError),
  #[error("API 响应中没有内容")]
  EmptyResponse,
  #[error("未配置 API 密钥")]
  MissingApiKey,
  #[error("请求缺少图像")]
  MissingImage,
  #[error("当前构建未启用远程推理")]
  RemoteUnsupported,
}

/// 采样参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
  pub n_predict: u32,
  pub ctx_size: u32,
  pub temperature: f32,
}

impl Default for Sampling {
  fn default() -> Self {
    Self {
      n_predict: 1,
      ctx_size: 512,
      temperature: 0.8,
    }
  }
}

/// 一次推理请求
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
  pub prompt: &'a str,
  pub image: Option<&'a RgbImage>,
  pub sampling: Sampling,
}

impl<'a> InferenceRequest<'a> {
  pub fn text(prompt: &'a str, sampling: Sampling) -> Self {
    Self {
      prompt,
      image: None,
      sampling,
    }
  }

  pub fn with_image(mut self, image: &'a RgbImage) -> Self {
    self.image = Some(image);
    self
  }
}

pub trait Dispatch {
  /// 发送一次请求，返回模型回答的文本（输出直接打印到终端时为 `None`）
  fn dispatch(&self, request: &InferenceRequest<'_>) -> Result<Option<String>, InferenceError>;
}

/// 推理后端，每次运行只使用其中一种
pub enum InferenceDispatcher {
  Local(LlamaCliRunner),
  #[cfg(feature = "remote_inference")]
  Remote(VisionClient),
}

impl Dispatch for InferenceDispatcher {
  fn dispatch(&self, request: &InferenceRequest<'_>) -> Result<Option<String>, InferenceError> {
    match self {
      InferenceDispatcher::Local(runner) => runner.dispatch(request),
      #[cfg(feature = "remote_inference")]
      InferenceDispatcher::Remote(client) => client.dispatch(request),
    }
  }
}

impl InferenceDispatcher {
  /// 对检测结果执行推理
  ///
  /// 本地后端只用提示词运行一次；远程后端对每张裁剪图各发一次请求，
  /// 每收到一个回答就以 `(从 1 开始的人物编号, 回答)` 调用 `on_answer`。
  /// 中途失败时，已交给 `on_answer` 的回答不受影响。
  #[cfg_attr(not(feature = "remote_inference"), allow(unused_variables, unused_mut))]
  pub fn dispatch_crops<F>(
    &self,
    crops: &[Crop],
    prompt: &str,
    sampling: Sampling,
    mut on_answer: F,
  ) -> Result<Vec<(usize, String)>, InferenceError>
  where
    F: FnMut(usize, &str),
  {
    match self {
      InferenceDispatcher::Local(runner) => {
        info!("运行本地推理");
        // llama-cli 的输出直接打印到终端
        runner.dispatch(&InferenceRequest::text(prompt, sampling))?;
        Ok(Vec::new())
      }
      #[cfg(feature = "remote_inference")]
      InferenceDispatcher::Remote(client) => {
        let mut answers = Vec::with_capacity(crops.len());
        for (i, crop) in crops.iter().enumerate() {
          if crop.is_empty() {
            warn!("人物 {} 的裁剪图面积为零，跳过", i + 1);
            continue;
          }
          let request = InferenceRequest::text(REMOTE_QUESTION, sampling).with_image(&crop.image);
          if let Some(text) = client.dispatch(&request)? {
            on_answer(i + 1, &text);
            answers.push((i + 1, text));
          }
        }
        info!("远程推理完成，共 {} 个回答", answers.len());
        Ok(answers)
      }
    }
  }
}
