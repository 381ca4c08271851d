// 该文件是 Cheying （车影） 项目的一部分。
// src/bin/build_classifier.rs - 根据实验配置构建分类模型
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

use anyhow::{Context, Result};
use candle_core::Device;
use clap::Parser;

use cheying::{
  classifier::{ClassifierConfig, build_model},
  experiment::ExperimentConfig,
};
use tracing::info;

/// 分类模型构建参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 实验配置文件 (YAML / JSON)
  #[arg(long, value_name = "EXPERIMENT")]
  pub experiment: PathBuf,
  /// 模型保存目录
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("实验配置: {}", args.experiment.display());
  info!("输出目录: {}", args.output.display());

  let experiment = ExperimentConfig::load(&args.experiment)?;
  let config = ClassifierConfig::try_from(experiment.model)?;

  let now = std::time::Instant::now();
  let model = build_model(&config, &Device::Cpu).context("构建分类模型失败")?;
  info!("模型构建完成，耗时: {:.2?}", now.elapsed());
  println!("{}", model);

  model.save(&args.output)?;
  Ok(())
}
