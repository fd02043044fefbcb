// 该文件是 EdgeDemo 项目的一部分。
// src/config.rs - 配置
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

use serde::Deserialize;

pub const ENV_PREFIX: &str = "EDGEDEMO";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
  pub log_level: String,
  pub detector: DetectorSettings,
  pub inference: InferenceSettings,
  pub remote: RemoteSettings,
  #[serde(default)]
  pub draw: DrawSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorSettings {
  pub model_path: PathBuf,
  pub confidence: f32,
  pub nms_threshold: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceSettings {
  /// llama.cpp 编译目录
  pub build_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSettings {
  pub base_url: String,
  pub model: String,
  #[serde(default)]
  pub api_key: Option<String>,
}

impl RemoteSettings {
  /// 未配置时使用 `OPENAI_API_KEY` 环境变量
  pub fn resolved_api_key(&self) -> Option<String> {
    self
      .api_key
      .clone()
      .filter(|key| !key.is_empty())
      .or_else(|| std::env::var(OPENAI_API_KEY_ENV).ok())
  }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DrawSettings {
  #[serde(default)]
  pub font_path: Option<PathBuf>,
}

/// 读取配置：内置默认值，然后是配置文件（可选），最后是 `EDGEDEMO__*` 环境变量
pub fn get_configuration(config_file: Option<&Path>) -> Result<Settings, config::ConfigError> {
  let mut builder = config::Config::builder()
    .set_default("log_level", "info")?
    .set_default("detector.model_path", "models/yolov8s.onnx")?
    .set_default("detector.confidence", 0.25_f64)?
    .set_default("detector.nms_threshold", 0.45_f64)?
    .set_default("inference.build_dir", "BitNet/3rdparty/llama.cpp/build")?
    .set_default("remote.base_url", "https://api.openai.com/v1/")?
    .set_default("remote.model", "gpt-4o-mini")?;

  if let Some(path) = config_file {
    builder = builder.add_source(config::File::from(path).required(false));
  }

  builder
    .add_source(
      config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__"),
    )
    .build()?
    .try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = get_configuration(Some(&dir.path().join("missing.yaml"))).unwrap();

    assert_eq!(settings.log_level, "info");
    assert_eq!(settings.detector.model_path, PathBuf::from("models/yolov8s.onnx"));
    assert!((settings.detector.confidence - 0.25).abs() < 1e-6);
    assert!((settings.detector.nms_threshold - 0.45).abs() < 1e-6);
    assert_eq!(
      settings.inference.build_dir,
      PathBuf::from("BitNet/3rdparty/llama.cpp/build")
    );
    assert_eq!(settings.remote.model, "gpt-4o-mini");
    assert!(settings.draw.font_path.is_none());
  }

  #[test]
  fn test_yaml_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edgedemo.yaml");
    std::fs::write(
      &path,
      "log_level: debug\n\
       detector:\n  confidence: 0.5\n\
       remote:\n  base_url: http://localhost:8080/v1\n  api_key: sk-test\n\
       draw:\n  font_path: assets/font.ttf\n",
    )
    .unwrap();

    let settings = get_configuration(Some(&path)).unwrap();

    assert_eq!(settings.log_level, "debug");
    assert!((settings.detector.confidence - 0.5).abs() < 1e-6);
    assert!((settings.detector.nms_threshold - 0.45).abs() < 1e-6);
    assert_eq!(settings.remote.base_url, "http://localhost:8080/v1");
    assert_eq!(settings.remote.resolved_api_key().as_deref(), Some("sk-test"));
    assert_eq!(settings.draw.font_path, Some(PathBuf::from("assets/font.ttf")));
  }
}
