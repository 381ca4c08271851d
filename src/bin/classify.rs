// 该文件是 Cheying （车影） 项目的一部分。
// src/bin/classify.rs - 图像分类推理
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

use anyhow::{Result, anyhow};
use candle_core::Device;
use clap::Parser;
use url::Url;

use cheying::{FromUrl, classifier::ClassifierModel, input::ImageFileInput};
use tracing::info;

/// 分类推理参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// build-classifier 保存的模型目录
  #[arg(long, value_name = "MODEL")]
  pub model: PathBuf,
  /// 输入图像，例如 image:///data/car.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出概率最高的类别数
  #[arg(long, default_value_t = 5)]
  pub top: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型目录: {}", args.model.display());
  info!("输入来源: {}", args.input);

  let model = ClassifierModel::load(&args.model, &Device::Cpu)?;
  let frame = ImageFileInput::from_url(&args.input)?
    .next()
    .ok_or_else(|| anyhow!("没有输入帧"))?;

  let now = std::time::Instant::now();
  let probs = model.predict_image(&frame.to_rgb_image())?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  let mut ranked: Vec<(usize, f32)> = probs.into_iter().enumerate().collect();
  ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
  for (class, prob) in ranked.into_iter().take(args.top) {
    println!("{:>4}: {:.4}", class, prob);
  }
  Ok(())
}
