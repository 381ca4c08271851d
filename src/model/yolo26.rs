// 该文件是 Cheying （车影） 项目的一部分。
// src/model/yolo26.rs - YOLO26 检测模型
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

use tracing::{debug, error};

use crate::model::{DetectItem, DetectResult};

const YOLO26_CLASS_NUM: usize = 80;
const YOLO26_INPUT_W: f32 = 640.0;
const YOLO26_INPUT_H: f32 = 640.0;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

/// 默认置信度阈值
pub const YOLO26_OBJECT_THRESH: f32 = 0.5;

/// 根据张量大小匹配回归和分类输出
/// 返回 (reg, cls) 元组，如果大小不匹配则返回 None
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
  head_idx: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    debug!("检测头 {}: 输出顺序交换", head_idx);
    Some((tensor2, tensor1))
  } else {
    error!(
      "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}, 期望回归: {}, 期望分类: {}",
      head_idx,
      tensor1.len(),
      tensor2.len(),
      reg_expected,
      cls_expected
    );
    None
  }
}

/// 解码 YOLO26 三个检测头的六个输出张量
///
/// 返回的边界框为相对模型输入的归一化坐标 `[x_min, y_min, x_max, y_max]`，
/// 类别为 COCO 类别编号。
pub fn decode_yolo26<S: AsRef<[f32]>>(outputs: &[S], score_threshold: f32) -> DetectResult<u32> {
  let mut items = Vec::new();

  for (head_idx, (&(map_h, map_w), stride)) in
    YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
  {
    let spatial = map_h * map_w;
    let reg_expected = 4 * spatial;
    let cls_expected = YOLO26_CLASS_NUM * spatial;

    // 由于 RKNN 输出顺序可能不同，需要根据张量大小来判断哪个是回归，哪个是分类
    let (Some(tensor1), Some(tensor2)) = (outputs.get(head_idx * 2), outputs.get(head_idx * 2 + 1))
    else {
      error!("缺少检测头 {} 的输出", head_idx);
      continue;
    };

    let Some((reg, cls)) = match_reg_cls_tensors(
      tensor1.as_ref(),
      tensor2.as_ref(),
      reg_expected,
      cls_expected,
      head_idx,
    ) else {
      continue;
    };

    for h in 0..map_h {
      for w in 0..map_w {
        let idx = h * map_w + w;

        let (score, class_id) = {
          let mut max_logit = f32::MIN;
          let mut cls_idx = 0usize;
          for c in 0..YOLO26_CLASS_NUM {
            let logit = cls[c * spatial + idx];
            if logit > max_logit {
              max_logit = logit;
              cls_idx = c;
            }
          }
          (sigmoid(max_logit), cls_idx as u32)
        };

        if score <= score_threshold {
          continue;
        }

        let cx = reg[idx];
        let cy = reg[spatial + idx];
        let cw = reg[2 * spatial + idx];
        let ch = reg[3 * spatial + idx];

        let grid_x = (w as f32) + 0.5;
        let grid_y = (h as f32) + 0.5;

        let xmin = ((grid_x - cx) * stride).clamp(0.0, YOLO26_INPUT_W);
        let ymin = ((grid_y - cy) * stride).clamp(0.0, YOLO26_INPUT_H);
        let xmax = ((grid_x + cw) * stride).clamp(0.0, YOLO26_INPUT_W);
        let ymax = ((grid_y + ch) * stride).clamp(0.0, YOLO26_INPUT_H);

        items.push(DetectItem {
          kind: class_id,
          score,
          bbox: [
            xmin / YOLO26_INPUT_W,
            ymin / YOLO26_INPUT_H,
            xmax / YOLO26_INPUT_W,
            ymax / YOLO26_INPUT_H,
          ],
        });
      }
    }
  }

  debug!("检测到 {} 个物体", items.len());
  DetectResult::new(items)
}

/// 收集各检测头的输出，任一输出读取失败即返回错误
#[cfg_attr(not(feature = "model_yolo26"), allow(dead_code))]
fn collect_head_outputs<E: std::fmt::Display>(
  outputs: impl IntoIterator<Item = Result<Vec<f32>, E>>,
) -> Result<Vec<Vec<f32>>, E> {
  outputs
    .into_iter()
    .enumerate()
    .map(|(idx, output)| {
      output.inspect_err(|e| error!("获取第 {} 个输出失败: {}", idx, e))
    })
    .collect()
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(feature = "model_yolo26")]
pub use self::rknn::{Yolo26, Yolo26Builder, Yolo26Error};

#[cfg(feature = "model_yolo26")]
mod rknn {
  use std::marker::PhantomData;

  use image::imageops::FilterType;
  use rknpu::{Context, InitFlags, TensorType};
  use thiserror::Error;
  use tracing::{debug, error, info};
  use url::Url;

  use super::{
    YOLO26_INPUT_H, YOLO26_INPUT_W, YOLO26_OBJECT_THRESH, collect_head_outputs, decode_yolo26,
  };
  use crate::{
    FromUrl, FromUrlWithScheme,
    frame::RgbFrame,
    input::AsNhwcFrame,
    model::{DetectItem, DetectResult, Model, WithLabel},
  };

  const YOLO26_NUM_INPUTS: u32 = 1;
  const YOLO26_NUM_OUTPUTS: u32 = 6;

  #[derive(Error, Debug)]
  pub enum Yolo26Error {
    #[error("模型加载错误: {0}")]
    ModelLoadError(std::io::Error),
    #[error("模型无效: {0}, 错误: {1}")]
    ModelInvalid(String, rknpu::Error),
    #[error("RKNN 错误: {0}")]
    RknnError(rknpu::Error),
    #[error("模型路径错误: {0}")]
    ModelPathError(String),
  }

  impl From<std::io::Error> for Yolo26Error {
    fn from(err: std::io::Error) -> Self {
      Yolo26Error::ModelLoadError(err)
    }
  }

  impl From<rknpu::Error> for Yolo26Error {
    fn from(err: rknpu::Error) -> Self {
      Yolo26Error::RknnError(err)
    }
  }

  impl Yolo26Error {
    pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
      Yolo26Error::ModelInvalid(msg.to_string(), e)
    }
  }

  /// YOLO26 检测器，在 RKNPU 上运行
  pub struct Yolo26<T> {
    context: Context,
    score_threshold: f32,
    _phantom: PhantomData<T>,
  }

  pub struct Yolo26Builder {
    model_path: String,
    flags: InitFlags,
    score_threshold: f32,
  }

  impl FromUrlWithScheme for Yolo26Builder {
    const SCHEME: &'static str = "yolo26";
  }

  impl FromUrl for Yolo26Builder {
    type Error = Yolo26Error;

    fn from_url(url: &Url) -> Result<Self, Self::Error> {
      if url.scheme() != Self::SCHEME {
        return Err(Yolo26Error::ModelPathError(format!(
          "模型路径必须使用 {} 方案",
          Self::SCHEME
        )));
      }

      Ok(Yolo26Builder {
        model_path: url.path().to_string(),
        flags: InitFlags::default(),
        score_threshold: YOLO26_OBJECT_THRESH,
      })
    }
  }

  impl Yolo26Builder {
    pub fn flags(mut self, flags: InitFlags) -> Self {
      self.flags = flags;
      self
    }

    pub fn score_threshold(mut self, score_threshold: f32) -> Self {
      self.score_threshold = score_threshold;
      self
    }

    pub fn build<T>(self) -> Result<Yolo26<T>, Yolo26Error> {
      info!("加载模型文件: {}", self.model_path);
      let mode_data = std::fs::read(&self.model_path)?;
      debug!(
        "模型文件大小: {:.2} MB",
        mode_data.len() as f64 / (1024.0 * 1024.0)
      );

      info!("创建 RKNN 推理上下文");
      let context = Context::new(&mode_data, self.flags)?;

      match context.sdk_version() {
        Ok(version) => {
          if let Ok(api_ver) = version.api_version() {
            debug!("模型 API 版本: {}", api_ver);
          }
          if let Ok(drv_ver) = version.driver_version() {
            debug!("模型驱动版本: {}", drv_ver);
          }
        }
        Err(e) => {
          error!("查询 SDK 版本失败: {}", e);
          return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
        }
      }

      let num_inputs = context
        .num_inputs()
        .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
      let num_outputs = context
        .num_outputs()
        .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

      if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
        let msg = format!(
          "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
          YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
        );
        error!("{}", msg);
        return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
      }

      info!("模型加载完成，置信度阈值: {}", self.score_threshold);
      Ok(Yolo26 {
        context,
        score_threshold: self.score_threshold,
        _phantom: PhantomData,
      })
    }
  }

  impl<T: WithLabel> Model for Yolo26<T> {
    type Input = RgbFrame;
    type Output = DetectResult<T>;
    type Error = Yolo26Error;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
      let (width, height) = (input.width() as f32, input.height() as f32);

      // 调整图像大小到模型输入尺寸
      let resized;
      let data = if (width, height) == (YOLO26_INPUT_W, YOLO26_INPUT_H) {
        input.as_nhwc()
      } else {
        resized = image::imageops::resize(
          &input.to_rgb_image(),
          YOLO26_INPUT_W as u32,
          YOLO26_INPUT_H as u32,
          FilterType::Triangle,
        );
        resized.as_raw().as_slice()
      };

      debug!("设置模型输入");
      self
        .context
        .set_input(0, data, rknpu::TensorFormat::NHWC, TensorType::UInt8)?;

      debug!("执行模型推理");
      self.context.run()?;

      let output = self.context.get_outputs()?;
      let tensors = collect_head_outputs(
        (0..YOLO26_NUM_OUTPUTS as usize).map(|idx| output.get_f32(idx).map(|data| data.to_vec())),
      )?;

      // 归一化坐标映射回原图像素坐标
      let items = decode_yolo26(&tensors, self.score_threshold)
        .items
        .iter()
        .map(|item| DetectItem {
          kind: T::from_label_id(item.kind),
          score: item.score,
          bbox: [
            item.bbox[0] * width,
            item.bbox[1] * height,
            item.bbox[2] * width,
            item.bbox[3] * height,
          ],
        })
        .collect();

      Ok(DetectResult::new(items))
    }
  }
}
