// 该文件是 Cheying （车影） 项目的一部分。
// src/classifier/config.rs - 分类模型配置
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

use serde::{Deserialize, Serialize};

use super::{
  ClassifierError, augment::AugmentationConfig, backbone::BackboneKind,
};

/// 预训练骨干网络要求的最小输入边长
pub const MIN_INPUT_SIDE: usize = 32;
const RGB_CHANNELS: usize = 3;

/// 输入图像形状 (高, 宽, 通道)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
  pub height: usize,
  pub width: usize,
  pub channels: usize,
}

impl InputShape {
  pub const fn new(height: usize, width: usize, channels: usize) -> Self {
    Self {
      height,
      width,
      channels,
    }
  }

  pub const fn as_tuple(&self) -> (usize, usize, usize) {
    (self.height, self.width, self.channels)
  }
}

impl Default for InputShape {
  fn default() -> Self {
    Self::new(224, 224, RGB_CHANNELS)
  }
}

impl From<[usize; 3]> for InputShape {
  fn from([height, width, channels]: [usize; 3]) -> Self {
    Self::new(height, width, channels)
  }
}

/// 骨干网络初始权重来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackboneWeights {
  /// ImageNet 预训练权重；未指定文件时从 Hugging Face Hub 下载
  ImageNet { file: Option<PathBuf> },
  /// 随机初始化
  Random,
}

impl Default for BackboneWeights {
  fn default() -> Self {
    Self::ImageNet { file: None }
  }
}

/// 构建全新模型所需的参数
#[derive(Debug, Clone, PartialEq)]
pub struct FreshInit {
  pub backbone: BackboneKind,
  pub weights: BackboneWeights,
  pub input_shape: InputShape,
  pub dropout_rate: f32,
  pub augmentation: Option<AugmentationConfig>,
  pub classes: usize,
  pub train_all: bool,
  pub l1: f32,
  pub l2: f32,
}

impl FreshInit {
  pub fn new(classes: usize) -> Self {
    Self {
      backbone: BackboneKind::default(),
      weights: BackboneWeights::default(),
      input_shape: InputShape::default(),
      dropout_rate: 0.0,
      augmentation: None,
      classes,
      train_all: false,
      l1: 0.0,
      l2: 0.0,
    }
  }

  pub fn with_backbone(mut self, backbone: BackboneKind) -> Self {
    self.backbone = backbone;
    self
  }

  pub fn with_weights(mut self, weights: BackboneWeights) -> Self {
    self.weights = weights;
    self
  }

  pub fn with_input_shape(mut self, input_shape: impl Into<InputShape>) -> Self {
    self.input_shape = input_shape.into();
    self
  }

  pub fn with_dropout_rate(mut self, dropout_rate: f32) -> Self {
    self.dropout_rate = dropout_rate;
    self
  }

  pub fn with_augmentation(mut self, augmentation: Option<AugmentationConfig>) -> Self {
    self.augmentation = augmentation;
    self
  }

  pub fn with_train_all(mut self, train_all: bool) -> Self {
    self.train_all = train_all;
    self
  }

  pub fn with_regularization(mut self, l1: f32, l2: f32) -> Self {
    self.l1 = l1;
    self.l2 = l2;
    self
  }

  /// 在加载任何权重之前检查配置
  pub fn validate(&self) -> Result<(), ClassifierError> {
    let InputShape {
      height,
      width,
      channels,
    } = self.input_shape;

    if height < MIN_INPUT_SIDE || width < MIN_INPUT_SIDE {
      return Err(ClassifierError::Configuration(format!(
        "输入尺寸 {}x{} 过小，边长不能小于 {}",
        height, width, MIN_INPUT_SIDE
      )));
    }
    if channels != RGB_CHANNELS {
      return Err(ClassifierError::Configuration(format!(
        "输入通道数必须为 {}, 实际为 {}",
        RGB_CHANNELS, channels
      )));
    }
    if !(0.0..1.0).contains(&self.dropout_rate) {
      return Err(ClassifierError::Configuration(format!(
        "dropout_rate 必须在 [0, 1) 内, 实际为 {}",
        self.dropout_rate
      )));
    }
    if self.classes == 0 {
      return Err(ClassifierError::Configuration(
        "classes 必须为正整数".to_string(),
      ));
    }
    for (name, value) in [("l1", self.l1), ("l2", self.l2)] {
      if !value.is_finite() || value < 0.0 {
        return Err(ClassifierError::Configuration(format!(
          "正则化系数 {} 必须为非负数, 实际为 {}",
          name, value
        )));
      }
    }
    if let Some(augmentation) = &self.augmentation {
      augmentation.validate()?;
    }

    Ok(())
  }
}

/// 模型来源：全新构建或加载已保存的模型
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierConfig {
  FreshInit(FreshInit),
  LoadExisting { path: PathBuf },
}

/// 随模型一起持久化的结构描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
  pub format_version: u32,
  pub backbone: BackboneKind,
  pub input_shape: InputShape,
  pub classes: usize,
  pub dropout_rate: f32,
  pub augmentation: Option<AugmentationConfig>,
  pub train_all: bool,
  pub l1: f32,
  pub l2: f32,
}

impl ClassifierSpec {
  pub const FORMAT_VERSION: u32 = 1;
}

impl From<&FreshInit> for ClassifierSpec {
  fn from(fresh: &FreshInit) -> Self {
    Self {
      format_version: Self::FORMAT_VERSION,
      backbone: fresh.backbone,
      input_shape: fresh.input_shape,
      classes: fresh.classes,
      dropout_rate: fresh.dropout_rate,
      augmentation: fresh.augmentation.clone(),
      train_all: fresh.train_all,
      l1: fresh.l1,
      l2: fresh.l2,
    }
  }
}
