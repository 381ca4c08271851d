// 该文件是 Cheying （车影） 项目的一部分。
// src/task.rs - 任务定义
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

use tracing::info;

use crate::{
  frame::RgbFrame,
  locator::{VehicleBox, locate_vehicle},
  model::{CocoLabel, DetectResult, Model},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 对输入的每一帧定位车辆并渲染结果
#[derive(Default, Debug)]
pub struct LocateTask {
  frame_number: Option<usize>,
}

impl LocateTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbFrame>,
  M: Model<Input = RgbFrame, Output = DetectResult<CocoLabel>, Error = ME>,
  O: Render<RgbFrame, VehicleBox, Error = RE>,
> Task<I, M, O> for LocateTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let mut frame_index = 0;
    for frame in input {
      frame_index += 1;
      let now = std::time::Instant::now();
      let vehicle = locate_vehicle(&model, &frame)?;
      let elapsed = now.elapsed();
      info!(
        "第 {} 帧定位完成，耗时: {:.2?}, 结果: {:?}",
        frame_index,
        elapsed,
        vehicle.as_tuple()
      );
      output.render_result(&frame, &vehicle)?;

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
    }

    if frame_index == 0 {
      return Err(anyhow::anyhow!("没有输入帧"));
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}
