// 该文件是 EdgeDemo 项目的一部分。
// src/logging.rs - 日志初始化
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

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 默认过滤规则，`ort` 只记录警告
pub fn filter_directive(log_level: &str) -> String {
  format!("{},ort=warn", log_level)
}

/// 初始化全局日志，`RUST_LOG` 优先于配置的日志级别
pub fn init_logging(log_level: &str) -> anyhow::Result<()> {
  let env_filter =
    EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter_directive(log_level)))?;

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_target(false))
    .try_init()?;
  Ok(())
}
