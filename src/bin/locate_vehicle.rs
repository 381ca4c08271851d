// 该文件是 Cheying （车影） 项目的一部分。
// src/bin/locate_vehicle.rs - 车辆定位
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use cheying::{
  FromUrl,
  input::ImageFileInput,
  model::{CocoLabel, Yolo26Builder},
  output::SaveImageFileOutput,
  task::{LocateTask, Task},
};
use tracing::info;

/// 车辆定位参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型文件路径，例如 yolo26:///models/yolo26n.rknn
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/car.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像，追加 ?crop=true 时保存裁剪结果
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 检测置信度阈值
  #[arg(long, default_value_t = 0.5)]
  pub score_threshold: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let model = Yolo26Builder::from_url(&args.model)?
    .score_threshold(args.score_threshold)
    .build::<CocoLabel>()?;
  let output = SaveImageFileOutput::from_url(&args.output)?;

  LocateTask::default().run_task(input, model, output)
}
