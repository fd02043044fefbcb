// 该文件是 EdgeDemo 项目的一部分。
// src/main.rs - 命令行入口
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

mod args;

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use args::{Backend, Cli, Command, RunArgs};
use edgedemo::{
  config::{Settings, get_configuration},
  inference::{InferenceDispatcher, LlamaCliRunner, Sampling},
  input::{ImageLoader, InputError, Interruptible},
  logging::init_logging,
  model::Yolov8Builder,
  output::{DirectoryRecordOutput, draw::Draw},
  task::{InferencePlan, PeopleTask, Task},
};

fn main() -> Result<()> {
  let cli = Cli::parse();
  let settings = get_configuration(Some(&cli.config)).context("无法读取配置")?;
  init_logging(cli.log_level.as_deref().unwrap_or(&settings.log_level))?;

  let result = match cli.command {
    Command::Run(args) => run(args, &settings),
  };

  if let Err(err) = result {
    if is_no_images(&err) {
      error!("{:#}", err);
      std::process::exit(1);
    }
    return Err(err);
  }
  Ok(())
}

fn is_no_images(err: &anyhow::Error) -> bool {
  err
    .chain()
    .any(|cause| matches!(cause.downcast_ref::<InputError>(), Some(InputError::NoImages(_))))
}

fn run(args: RunArgs, settings: &Settings) -> Result<()> {
  let stop = Arc::new(AtomicBool::new(false));
  {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
      warn!("收到中断信号，准备退出...");
      stop.store(true, Ordering::SeqCst);
    })
    .context("无法设置 Ctrl-C 处理函数")?;
  }

  let loader = ImageLoader::new(&args.image_path, args.realtime)?;
  // 加载模型之前先确认有图片可读
  loader.check()?;

  let model_path = args
    .detector_model
    .clone()
    .unwrap_or_else(|| settings.detector.model_path.clone());
  let model = Yolov8Builder::new(&model_path)
    .confidence(settings.detector.confidence)
    .nms_threshold(settings.detector.nms_threshold)
    .build()
    .with_context(|| format!("无法加载检测模型 {}", model_path.display()))?;

  let output = match args.output.as_ref() {
    Some(directory) => {
      let mut draw = Draw::default();
      if let Some(font) = settings.draw.font_path.as_ref() {
        draw = draw.with_font_file(font)?;
      }
      info!("标注图片输出到 {}", directory.display());
      Some(
        DirectoryRecordOutput::new(directory)
          .with_draw(draw)
          .with_record(args.record),
      )
    }
    None => None,
  };

  let inference = if args.inference {
    Some(InferencePlan {
      dispatcher: build_dispatcher(&args, settings)?,
      prompt: args.prompt.clone(),
      sampling: Sampling {
        n_predict: args.n_predict,
        ctx_size: args.ctx_size,
        temperature: args.temperature,
      },
    })
  } else {
    None
  };

  let task = PeopleTask::new(args.number_of_images)
    .with_crops_dir(args.crops_dir.clone())
    .with_inference(inference);
  let source = Interruptible::new(loader, stop);
  let report = task.run_task(source, model, output)?;
  info!(
    "共处理 {} 帧，保存 {} 张裁剪图",
    report.frames,
    report.saved_crops.len()
  );

  Ok(())
}

fn build_dispatcher(args: &RunArgs, settings: &Settings) -> Result<InferenceDispatcher> {
  match args.backend {
    Backend::Local => {
      let runner = LlamaCliRunner::new(&settings.inference.build_dir, args.model.clone())
        .with_threads(args.threads)
        .with_conversation(args.conversation);
      info!("本地推理程序: {}", runner.main_path().display());
      Ok(InferenceDispatcher::Local(runner))
    }
    #[cfg(feature = "remote_inference")]
    Backend::Remote => {
      let client = edgedemo::inference::VisionClient::new(
        &settings.remote.base_url,
        settings.remote.model.clone(),
        settings.remote.resolved_api_key(),
      )?;
      info!("远程推理接口: {}", client.endpoint());
      Ok(InferenceDispatcher::Remote(client))
    }
    #[cfg(not(feature = "remote_inference"))]
    Backend::Remote => Err(edgedemo::inference::InferenceError::RemoteUnsupported.into()),
  }
}
