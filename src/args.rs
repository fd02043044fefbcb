// 该文件是 EdgeDemo 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::{Args, Parser, Subcommand, ValueEnum};

/// EdgeDemo 人物检测演示
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  /// 配置文件路径（不存在时使用默认配置）
  #[arg(long, global = true, default_value = "edgedemo.yaml", value_name = "FILE")]
  pub config: PathBuf,

  /// 日志级别，覆盖配置文件
  #[arg(long, global = true, value_name = "LEVEL")]
  pub log_level: Option<String>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 检测图片或摄像头中的人物
  Run(RunArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
  /// 本地 llama-cli
  #[default]
  Local,
  /// 远程视觉大模型 API
  Remote,
}

#[derive(Args, Debug)]
pub struct RunArgs {
  /// 图片目录
  #[arg(long, default_value = "data/images", value_name = "DIR")]
  pub image_path: PathBuf,

  /// 处理的帧数
  #[arg(long, default_value_t = 3, value_name = "COUNT")]
  pub number_of_images: usize,

  /// 使用摄像头
  #[arg(long)]
  pub realtime: bool,

  /// 检测后执行推理
  #[arg(long)]
  pub inference: bool,

  #[arg(long, value_enum, default_value_t = Backend::Local)]
  pub backend: Backend,

  /// 本地大模型文件
  #[arg(long, default_value = "models/ggml-model-i2_s.gguf", value_name = "FILE")]
  pub model: PathBuf,

  /// 预测的 token 数
  #[arg(long, default_value_t = 1)]
  pub n_predict: u32,

  #[arg(long, default_value_t = 1)]
  pub threads: u32,

  #[arg(long, default_value = "Describe the people in the picture.")]
  pub prompt: String,

  #[arg(long, default_value_t = 512)]
  pub ctx_size: u32,

  #[arg(long, default_value_t = 0.8)]
  pub temperature: f32,

  /// 对话模式（-cnv）
  #[arg(long)]
  pub conversation: bool,

  /// 检测模型路径，覆盖配置文件
  #[arg(long, value_name = "FILE")]
  pub detector_model: Option<PathBuf>,

  /// 标注图片输出目录
  #[arg(long, value_name = "DIR")]
  pub output: Option<PathBuf>,

  /// 同时写入检测记录
  #[arg(long, requires = "output")]
  pub record: bool,

  /// 裁剪图输出目录
  #[arg(long, value_name = "DIR")]
  pub crops_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run_args(args: &[&str]) -> RunArgs {
    let cli = Cli::try_parse_from(args).unwrap();
    match cli.command {
      Command::Run(args) => args,
    }
  }

  #[test]
  fn test_run_defaults() {
    let args = run_args(&["edgedemo", "run"]);

    assert_eq!(args.image_path, PathBuf::from("data/images"));
    assert_eq!(args.number_of_images, 3);
    assert!(!args.realtime);
    assert!(!args.inference);
    assert_eq!(args.backend, Backend::Local);
    assert_eq!(args.model, PathBuf::from("models/ggml-model-i2_s.gguf"));
    assert_eq!(args.n_predict, 1);
    assert_eq!(args.threads, 1);
    assert_eq!(args.prompt, "Describe the people in the picture.");
    assert_eq!(args.ctx_size, 512);
    assert!((args.temperature - 0.8).abs() < f32::EPSILON);
    assert!(!args.conversation);
    assert!(args.detector_model.is_none());
    assert!(args.output.is_none());
  }

  #[test]
  fn test_run_options() {
    let cli = Cli::try_parse_from([
      "edgedemo",
      "--log-level",
      "debug",
      "run",
      "--image-path",
      "photos",
      "--number-of-images",
      "5",
      "--realtime",
      "--inference",
      "--backend",
      "remote",
      "--conversation",
      "--output",
      "out",
      "--record",
    ])
    .unwrap();

    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    assert_eq!(cli.config, PathBuf::from("edgedemo.yaml"));
    let Command::Run(args) = cli.command;
    assert_eq!(args.image_path, PathBuf::from("photos"));
    assert_eq!(args.number_of_images, 5);
    assert!(args.realtime && args.inference && args.conversation && args.record);
    assert_eq!(args.backend, Backend::Remote);
    assert_eq!(args.output, Some(PathBuf::from("out")));
  }

  #[test]
  fn test_record_requires_output() {
    assert!(Cli::try_parse_from(["edgedemo", "run", "--record"]).is_err());
    assert!(Cli::try_parse_from(["edgedemo", "run", "--backend", "cloud"]).is_err());
  }
}
