// 该文件是 EdgeDemo 项目的一部分。
// tests/cli.rs - 命令行退出码测试
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

#![cfg(feature = "model_onnx")]

use std::process::Command;

fn edgedemo() -> Command {
  let mut command = Command::new(env!("CARGO_BIN_EXE_edgedemo"));
  command.env_remove("RUST_LOG");
  command
}

#[test]
fn empty_image_directory_exits_with_one() {
  let dir = tempfile::tempdir().unwrap();

  let status = edgedemo()
    .current_dir(dir.path())
    .args(["run", "--image-path"])
    .arg(dir.path())
    .status()
    .unwrap();

  assert_eq!(status.code(), Some(1));
}

#[test]
fn missing_detector_model_is_an_error() {
  let dir = tempfile::tempdir().unwrap();
  image::RgbImage::new(8, 8)
    .save(dir.path().join("img1.png"))
    .unwrap();

  let output = edgedemo()
    .current_dir(dir.path())
    .args(["run", "--image-path"])
    .arg(dir.path())
    .args(["--detector-model", "missing.onnx"])
    .output()
    .unwrap();

  assert!(!output.status.success());
  assert!(!String::from_utf8_lossy(&output.stdout).contains("Number of people recognized"));
}
