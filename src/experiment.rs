// 该文件是 Cheying （车影） 项目的一部分。
// src/experiment.rs - 实验配置文件
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

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::classifier::{
  AugmentationConfig, BackboneKind, BackboneWeights, ClassifierConfig, FreshInit,
};

/// 环境变量覆盖前缀，例如 `CHEYING__MODEL__DROPOUT_RATE=0.3`
pub const ENV_PREFIX: &str = "CHEYING";

const WEIGHTS_IMAGENET: &str = "imagenet";
const WEIGHTS_PRETRAINED: &str = "pretrained";
const WEIGHTS_RANDOM: &str = "random";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置失败: {0}")]
  Load(#[from] config::ConfigError),
  #[error("配置参数冲突: {0}")]
  Conflict(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentConfig {
  pub model: ModelParams,
}

impl ExperimentConfig {
  /// 读取 YAML / JSON 实验文件，并应用环境变量覆盖
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    info!("读取实验配置: {}", path.display());
    let config = Config::builder()
      .add_source(File::from(path))
      .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
      .build()?;
    let experiment: ExperimentConfig = config.try_deserialize()?;
    debug!("实验配置: {:?}", experiment);
    Ok(experiment)
  }
}

/// 实验文件中 `model` 段的参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelParams {
  /// `imagenet` / `pretrained` / `random`，或已保存模型的目录
  pub weights: String,
  pub input_shape: [usize; 3],
  pub dropout_rate: f32,
  pub data_aug_layer: Option<AugmentationConfig>,
  pub classes: usize,
  pub train_all: bool,
  #[serde(rename = "l1_")]
  pub l1: f32,
  #[serde(rename = "l2_")]
  pub l2: f32,
  pub backbone: BackboneKind,
  /// 本地 ImageNet 权重文件，不指定时从 Hub 下载
  pub backbone_weights_file: Option<PathBuf>,
}

impl Default for ModelParams {
  fn default() -> Self {
    Self {
      weights: WEIGHTS_IMAGENET.to_string(),
      input_shape: [224, 224, 3],
      dropout_rate: 0.0,
      data_aug_layer: None,
      classes: 0,
      train_all: false,
      l1: 0.0,
      l2: 0.0,
      backbone: BackboneKind::default(),
      backbone_weights_file: None,
    }
  }
}

impl TryFrom<ModelParams> for ClassifierConfig {
  type Error = ConfigError;

  fn try_from(params: ModelParams) -> Result<Self, Self::Error> {
    let weights = match params.weights.trim() {
      "" => return Err(ConfigError::Conflict("weights 不能为空".to_string())),
      WEIGHTS_IMAGENET | WEIGHTS_PRETRAINED => BackboneWeights::ImageNet {
        file: params.backbone_weights_file,
      },
      WEIGHTS_RANDOM => {
        if let Some(file) = params.backbone_weights_file {
          return Err(ConfigError::Conflict(format!(
            "weights 为 random 时不能指定 backbone_weights_file ({})",
            file.display()
          )));
        }
        BackboneWeights::Random
      }
      path => {
        debug!("weights 指向已保存的模型, 其余参数将被忽略");
        return Ok(ClassifierConfig::LoadExisting {
          path: PathBuf::from(path),
        });
      }
    };

    let fresh = FreshInit::new(params.classes)
      .with_backbone(params.backbone)
      .with_weights(weights)
      .with_input_shape(params.input_shape)
      .with_dropout_rate(params.dropout_rate)
      .with_augmentation(params.data_aug_layer)
      .with_train_all(params.train_all)
      .with_regularization(params.l1, params.l2);
    Ok(ClassifierConfig::FreshInit(fresh))
  }
}
