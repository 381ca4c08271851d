// 该文件是 Cheying （车影） 项目的一部分。
// src/classifier/augment.rs - 训练期数据增强
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

use std::{f32::consts::TAU, sync::Mutex};

use candle_core::Tensor;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::ClassifierError;

/// 增强幅度：单个数值表示 `[-f, f]`，数组表示 `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Factor {
  Symmetric(f32),
  Range([f32; 2]),
}

impl Factor {
  pub fn bounds(&self) -> (f32, f32) {
    match *self {
      Factor::Symmetric(f) => (-f.abs(), f.abs()),
      Factor::Range([lower, upper]) => (lower, upper),
    }
  }

  fn sample(&self, rng: &mut StdRng) -> f32 {
    let (lower, upper) = self.bounds();
    if lower == upper {
      lower
    } else {
      rng.gen_range(lower..=upper)
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipMode {
  Horizontal,
  Vertical,
  #[default]
  HorizontalAndVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomFlip {
  #[serde(default)]
  pub mode: FlipMode,
}

/// 旋转角度为 `factor * 2π`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomRotation {
  pub factor: Factor,
}

/// 正值缩小（拉远），负值放大；未给出宽度幅度时保持长宽比
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomZoom {
  pub height_factor: Factor,
  #[serde(default)]
  pub width_factor: Option<Factor>,
}

/// 数据增强配置，键为增强操作名
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AugmentationConfig {
  #[serde(default)]
  pub random_flip: Option<RandomFlip>,
  #[serde(default)]
  pub random_rotation: Option<RandomRotation>,
  #[serde(default)]
  pub random_zoom: Option<RandomZoom>,
  #[serde(default)]
  pub seed: Option<u64>,
}

impl AugmentationConfig {
  pub fn is_empty(&self) -> bool {
    self.random_flip.is_none() && self.random_rotation.is_none() && self.random_zoom.is_none()
  }

  pub fn validate(&self) -> Result<(), ClassifierError> {
    if let Some(rotation) = &self.random_rotation {
      check_range("random_rotation.factor", rotation.factor, f32::MIN, f32::MAX)?;
    }
    if let Some(zoom) = &self.random_zoom {
      check_range("random_zoom.height_factor", zoom.height_factor, -1.0, 1.0)?;
      if let Some(width_factor) = zoom.width_factor {
        check_range("random_zoom.width_factor", width_factor, -1.0, 1.0)?;
      }
      // 缩放倍率为 1 + factor，必须为正
      let lowest = [Some(zoom.height_factor), zoom.width_factor]
        .into_iter()
        .flatten()
        .map(|f| f.bounds().0)
        .fold(f32::INFINITY, f32::min);
      if lowest <= -1.0 {
        return Err(ClassifierError::Configuration(format!(
          "random_zoom 下界必须大于 -1, 实际为 {}",
          lowest
        )));
      }
    }
    Ok(())
  }
}

fn check_range(name: &str, factor: Factor, min: f32, max: f32) -> Result<(), ClassifierError> {
  let (lower, upper) = factor.bounds();
  if !lower.is_finite() || !upper.is_finite() || lower > upper || lower < min || upper > max {
    return Err(ClassifierError::Configuration(format!(
      "{} 取值无效: [{}, {}]",
      name, lower, upper
    )));
  }
  Ok(())
}

/// 单张图像的几何变换
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
  flip_h: bool,
  flip_v: bool,
  angle: f32,
  zoom_y: f32,
  zoom_x: f32,
}

impl Default for Transform {
  fn default() -> Self {
    Self {
      flip_h: false,
      flip_v: false,
      angle: 0.0,
      zoom_y: 1.0,
      zoom_x: 1.0,
    }
  }
}

impl Transform {
  /// 对每个输出像素反向求出源像素下标（最近邻，反射填充）
  fn source_indices(&self, height: usize, width: usize) -> Vec<u32> {
    let cy = (height as f32 - 1.0) / 2.0;
    let cx = (width as f32 - 1.0) / 2.0;
    let (sin, cos) = self.angle.sin_cos();

    let mut indices = Vec::with_capacity(height * width);
    for y in 0..height {
      for x in 0..width {
        let dx = (x as f32 - cx) * self.zoom_x;
        let dy = (y as f32 - cy) * self.zoom_y;
        let mut sx = cos * dx + sin * dy;
        let mut sy = -sin * dx + cos * dy;
        if self.flip_h {
          sx = -sx;
        }
        if self.flip_v {
          sy = -sy;
        }
        let sx = reflect((sx + cx).round() as i64, width);
        let sy = reflect((sy + cy).round() as i64, height);
        indices.push((sy * width + sx) as u32);
      }
    }
    indices
  }
}

/// 反射填充: d c b a | a b c d | d c b a
fn reflect(index: i64, len: usize) -> usize {
  let len = len as i64;
  let period = 2 * len;
  let m = index.rem_euclid(period);
  (if m < len { m } else { period - 1 - m }) as usize
}

/// 训练期数据增强层，推理时不生效
#[derive(Debug)]
pub struct Augmentation {
  config: AugmentationConfig,
  rng: Mutex<StdRng>,
}

impl Augmentation {
  pub fn new(config: AugmentationConfig) -> Self {
    let rng = match config.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    Self {
      config,
      rng: Mutex::new(rng),
    }
  }

  pub fn config(&self) -> &AugmentationConfig {
    &self.config
  }

  fn sample(&self, rng: &mut StdRng) -> Transform {
    let mut transform = Transform::default();

    if let Some(flip) = &self.config.random_flip {
      let (h, v) = match flip.mode {
        FlipMode::Horizontal => (true, false),
        FlipMode::Vertical => (false, true),
        FlipMode::HorizontalAndVertical => (true, true),
      };
      transform.flip_h = h && rng.gen_bool(0.5);
      transform.flip_v = v && rng.gen_bool(0.5);
    }

    if let Some(rotation) = &self.config.random_rotation {
      transform.angle = rotation.factor.sample(rng) * TAU;
    }

    if let Some(zoom) = &self.config.random_zoom {
      transform.zoom_y = 1.0 + zoom.height_factor.sample(rng);
      transform.zoom_x = match zoom.width_factor {
        Some(width_factor) => 1.0 + width_factor.sample(rng),
        None => transform.zoom_y,
      };
    }

    transform
  }

  /// 输入形状为 (batch, 高, 宽, 通道)，每张图像独立采样变换
  pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
    let (batch, height, width, channels) = xs.dims4()?;
    let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

    let mut images = Vec::with_capacity(batch);
    for b in 0..batch {
      let transform = self.sample(&mut rng);
      let index = Tensor::from_vec(
        transform.source_indices(height, width),
        height * width,
        xs.device(),
      )?;
      let image = xs
        .get(b)?
        .reshape((height * width, channels))?
        .index_select(&index, 0)?
        .reshape((height, width, channels))?;
      images.push(image);
    }

    Tensor::stack(&images, 0)
  }
}
