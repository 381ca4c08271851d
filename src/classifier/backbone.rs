// 该文件是 Cheying （车影） 项目的一部分。
// src/classifier/backbone.rs - ResNet 骨干网络
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

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Func, VarBuilder, VarMap};
use candle_transformers::models::resnet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ClassifierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneKind {
  ResNet18,
  ResNet34,
  #[default]
  ResNet50,
  ResNet101,
  ResNet152,
}

impl BackboneKind {
  /// 全局平均池化后的特征维度
  pub const fn feature_dim(&self) -> usize {
    match self {
      Self::ResNet18 | Self::ResNet34 => 512,
      Self::ResNet50 | Self::ResNet101 | Self::ResNet152 => 2048,
    }
  }

  /// Hugging Face Hub 上的 ImageNet 权重仓库
  pub const fn hub_repo(&self) -> &'static str {
    match self {
      Self::ResNet18 => "timm/resnet18.tv_in1k",
      Self::ResNet34 => "timm/resnet34.tv_in1k",
      Self::ResNet50 => "timm/resnet50.tv_in1k",
      Self::ResNet101 => "timm/resnet101.tv_in1k",
      Self::ResNet152 => "timm/resnet152.tv_in1k",
    }
  }

  fn build(&self, vb: VarBuilder<'static>) -> candle_core::Result<Func<'static>> {
    match self {
      Self::ResNet18 => resnet::resnet18_no_final_layer(vb),
      Self::ResNet34 => resnet::resnet34_no_final_layer(vb),
      Self::ResNet50 => resnet::resnet50_no_final_layer(vb),
      Self::ResNet101 => resnet::resnet101_no_final_layer(vb),
      Self::ResNet152 => resnet::resnet152_no_final_layer(vb),
    }
  }
}

/// 特征提取网络，权重保存在独立的 VarMap 中以便整体冻结
pub struct Backbone {
  kind: BackboneKind,
  net: Func<'static>,
  vars: VarMap,
}

impl Backbone {
  /// 构建随机初始化的骨干网络
  pub fn new(kind: BackboneKind, device: &Device) -> candle_core::Result<Self> {
    let vars = VarMap::new();
    let vb = VarBuilder::from_varmap(&vars, DType::F32, device);
    let net = kind.build(vb)?;
    debug!("骨干网络 {:?} 参数张量数量: {}", kind, vars.all_vars().len());
    Ok(Self { kind, net, vars })
  }

  pub fn kind(&self) -> BackboneKind {
    self.kind
  }

  pub fn vars(&self) -> &VarMap {
    &self.vars
  }

  /// 从 safetensors 文件覆盖全部权重，文件中多余的张量（例如分类头）会被忽略
  pub fn load_weights(&mut self, path: &Path) -> Result<(), ClassifierError> {
    info!("加载骨干网络权重: {}", path.display());
    self
      .vars
      .load(path)
      .map_err(|e| ClassifierError::model_load(path, e))
  }

  /// (batch, 3, 高, 宽) -> (batch, feature_dim)
  pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
    self.net.forward(xs)
  }
}

/// 获取 ImageNet 预训练权重，首次调用时下载并缓存
#[cfg(feature = "download")]
pub fn fetch_imagenet_weights(kind: BackboneKind) -> Result<PathBuf, ClassifierError> {
  info!("获取预训练权重: {}", kind.hub_repo());
  let api = hf_hub::api::sync::Api::new()
    .map_err(|e| ClassifierError::Download(format!("无法创建 Hub 客户端: {}", e)))?;
  api
    .model(kind.hub_repo().to_string())
    .get("model.safetensors")
    .map_err(|e| ClassifierError::Download(format!("{}: {}", kind.hub_repo(), e)))
}

#[cfg(not(feature = "download"))]
pub fn fetch_imagenet_weights(kind: BackboneKind) -> Result<PathBuf, ClassifierError> {
  Err(ClassifierError::Download(format!(
    "未启用 download 特性，请为 {} 指定本地权重文件",
    kind.hub_repo()
  )))
}
