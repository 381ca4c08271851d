// 该文件是 Cheying （车影） 项目的一部分。
// src/classifier.rs - 图像分类模型构建
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

use std::path::Path;

use candle_core::{D, DType, Device, Module, Tensor, Var};
use candle_nn::{Dropout, Linear, VarBuilder, VarMap};
use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};

mod augment;
mod backbone;
mod config;
mod preprocess;

pub use self::augment::{
  Augmentation, AugmentationConfig, Factor, FlipMode, RandomFlip, RandomRotation, RandomZoom,
};
pub use self::backbone::{Backbone, BackboneKind, fetch_imagenet_weights};
pub use self::config::{
  BackboneWeights, ClassifierConfig, ClassifierSpec, FreshInit, InputShape, MIN_INPUT_SIDE,
};
pub use self::preprocess::{IMAGENET_MEAN, IMAGENET_STD, ImageNetNormalize, image_to_tensor};

const SPEC_FILE: &str = "classifier.json";
const BACKBONE_FILE: &str = "backbone.safetensors";
const HEAD_FILE: &str = "head.safetensors";

#[derive(Error, Debug)]
pub enum ClassifierError {
  #[error("配置错误: {0}")]
  Configuration(String),
  #[error("模型加载错误 {path}: {reason}")]
  ModelLoad { path: String, reason: String },
  #[error("模型保存错误 {path}: {reason}")]
  ModelSave { path: String, reason: String },
  #[error("输入图像无效: {0}")]
  InvalidImage(String),
  #[error("权重下载错误: {0}")]
  Download(String),
  #[error("张量运算错误: {0}")]
  Candle(#[from] candle_core::Error),
}

impl ClassifierError {
  pub fn model_load(path: &Path, reason: impl ToString) -> Self {
    ClassifierError::ModelLoad {
      path: path.display().to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn model_save(path: &Path, reason: impl ToString) -> Self {
    ClassifierError::ModelSave {
      path: path.display().to_string(),
      reason: reason.to_string(),
    }
  }
}

/// 构建分类模型：全新构建时接上分类头，否则原样加载已保存的模型
pub fn build_model(
  config: &ClassifierConfig,
  device: &Device,
) -> Result<ClassifierModel, ClassifierError> {
  match config {
    ClassifierConfig::FreshInit(fresh) => ClassifierModel::fresh(fresh, device),
    ClassifierConfig::LoadExisting { path } => ClassifierModel::load(path, device),
  }
}

/// 分类模型：增强(可选) -> 预处理 -> 骨干网络 -> dropout -> softmax 分类头
pub struct ClassifierModel {
  spec: ClassifierSpec,
  augmentation: Option<Augmentation>,
  preprocess: ImageNetNormalize,
  backbone: Backbone,
  dropout: Dropout,
  head: Linear,
  head_vars: VarMap,
  device: Device,
}

impl ClassifierModel {
  /// 按结构描述搭建网络，所有权重随机初始化
  fn assemble(spec: ClassifierSpec, device: &Device) -> Result<Self, ClassifierError> {
    let augmentation = spec
      .augmentation
      .clone()
      .filter(|config| !config.is_empty())
      .map(Augmentation::new);
    let preprocess = ImageNetNormalize::new(device)?;
    let backbone = Backbone::new(spec.backbone, device)?;
    let dropout = Dropout::new(spec.dropout_rate);

    let head_vars = VarMap::new();
    let vb = VarBuilder::from_varmap(&head_vars, DType::F32, device);
    let head = candle_nn::linear(spec.backbone.feature_dim(), spec.classes, vb.pp("head"))?;

    Ok(Self {
      spec,
      augmentation,
      preprocess,
      backbone,
      dropout,
      head,
      head_vars,
      device: device.clone(),
    })
  }

  fn fresh(fresh: &FreshInit, device: &Device) -> Result<Self, ClassifierError> {
    fresh.validate()?;

    info!(
      "构建分类模型: 骨干网络 {:?}, 输入 {:?}, 类别数 {}",
      fresh.backbone,
      fresh.input_shape.as_tuple(),
      fresh.classes
    );
    let mut model = Self::assemble(ClassifierSpec::from(fresh), device)?;

    match &fresh.weights {
      BackboneWeights::ImageNet { file } => {
        let path = match file {
          Some(path) => path.clone(),
          None => fetch_imagenet_weights(fresh.backbone)?,
        };
        model.backbone.load_weights(&path)?;
      }
      BackboneWeights::Random => debug!("骨干网络使用随机初始化"),
    }

    if !fresh.train_all {
      info!("骨干网络权重已冻结");
    }
    Ok(model)
  }

  /// 加载 `save` 写出的模型目录
  pub fn load(path: &Path, device: &Device) -> Result<Self, ClassifierError> {
    info!("加载已保存的模型: {}", path.display());
    if !path.is_dir() {
      return Err(ClassifierError::model_load(path, "模型目录不存在"));
    }

    let spec_path = path.join(SPEC_FILE);
    let content =
      std::fs::read_to_string(&spec_path).map_err(|e| ClassifierError::model_load(&spec_path, e))?;
    let spec: ClassifierSpec =
      serde_json::from_str(&content).map_err(|e| ClassifierError::model_load(&spec_path, e))?;
    if spec.format_version != ClassifierSpec::FORMAT_VERSION {
      return Err(ClassifierError::model_load(
        &spec_path,
        format!(
          "不支持的格式版本 {}, 期望 {}",
          spec.format_version,
          ClassifierSpec::FORMAT_VERSION
        ),
      ));
    }
    debug!("模型结构: {:?}", spec);

    let mut model = Self::assemble(spec, device)
      .map_err(|e| ClassifierError::model_load(&spec_path, e))?;
    model.backbone.load_weights(&path.join(BACKBONE_FILE))?;

    let head_path = path.join(HEAD_FILE);
    model
      .head_vars
      .load(&head_path)
      .map_err(|e| ClassifierError::model_load(&head_path, e))?;

    info!("模型加载完成");
    Ok(model)
  }

  /// 将结构描述与全部权重写入目录
  pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
    std::fs::create_dir_all(path).map_err(|e| ClassifierError::model_save(path, e))?;

    let spec_path = path.join(SPEC_FILE);
    let content =
      serde_json::to_string_pretty(&self.spec).map_err(|e| ClassifierError::model_save(&spec_path, e))?;
    std::fs::write(&spec_path, content).map_err(|e| ClassifierError::model_save(&spec_path, e))?;

    for (vars, file) in [(self.backbone.vars(), BACKBONE_FILE), (&self.head_vars, HEAD_FILE)] {
      let file_path = path.join(file);
      vars
        .save(&file_path)
        .map_err(|e| ClassifierError::model_save(&file_path, e))?;
    }

    info!("模型已保存到: {}", path.display());
    Ok(())
  }

  pub fn spec(&self) -> &ClassifierSpec {
    &self.spec
  }

  pub fn device(&self) -> &Device {
    &self.device
  }

  pub fn input_shape(&self) -> InputShape {
    self.spec.input_shape
  }

  /// 分类头输出单元数
  pub fn head_units(&self) -> usize {
    self.head.weight().dims()[0]
  }

  pub fn has_augmentation(&self) -> bool {
    self.augmentation.is_some()
  }

  /// 参与训练的参数：分类头，以及 `train_all` 时的骨干网络
  pub fn trainable_vars(&self) -> Vec<Var> {
    let mut vars = self.head_vars.all_vars();
    if self.spec.train_all {
      vars.extend(self.backbone.vars().all_vars());
    }
    vars
  }

  /// 分类头权重的 L1/L2 正则项
  pub fn regularization_loss(&self) -> Result<Tensor, ClassifierError> {
    let weight = self.head.weight();
    let l1 = weight.abs()?.sum_all()?.affine(self.spec.l1 as f64, 0.0)?;
    let l2 = weight.sqr()?.sum_all()?.affine(self.spec.l2 as f64, 0.0)?;
    Ok(l1.add(&l2)?)
  }

  /// 输入为 0..255 的 (batch, 高, 宽, 3) 张量，输出各类别概率
  ///
  /// `train` 为真时启用数据增强与 dropout。
  pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor, ClassifierError> {
    let (_, height, width, channels) = xs
      .dims4()
      .map_err(|_| ClassifierError::InvalidImage(format!("输入维度应为 4, 实际为 {:?}", xs.dims())))?;
    if (height, width, channels) != self.spec.input_shape.as_tuple() {
      return Err(ClassifierError::InvalidImage(format!(
        "输入形状 {:?} 与模型输入 {:?} 不一致",
        (height, width, channels),
        self.spec.input_shape.as_tuple()
      )));
    }

    let xs = xs.to_dtype(DType::F32)?;
    let xs = match (&self.augmentation, train) {
      (Some(augmentation), true) => augmentation.forward(&xs)?,
      _ => xs,
    };
    let xs = self.preprocess.forward(&xs)?;

    let features = self.backbone.forward(&xs)?;
    let features = if self.spec.train_all {
      features
    } else {
      features.detach()
    };

    let xs = self.dropout.forward(&features, train)?;
    let logits = self.head.forward(&xs)?;
    Ok(candle_nn::ops::softmax(&logits, D::Minus1)?)
  }

  /// 推理模式前向
  pub fn forward(&self, xs: &Tensor) -> Result<Tensor, ClassifierError> {
    self.forward_t(xs, false)
  }

  /// 将图像缩放到模型输入尺寸后推理，返回各类别概率
  pub fn predict_image(&self, image: &RgbImage) -> Result<Vec<f32>, ClassifierError> {
    let InputShape { height, width, .. } = self.spec.input_shape;
    let resized;
    let image = if image.dimensions() == (width as u32, height as u32) {
      image
    } else {
      resized = image::imageops::resize(image, width as u32, height as u32, FilterType::Triangle);
      &resized
    };

    let xs = image_to_tensor(image, &self.device)?;
    let probs = self.forward(&xs)?.squeeze(0)?.to_vec1::<f32>()?;
    Ok(probs)
  }
}

impl std::fmt::Display for ClassifierModel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let (h, w, c) = self.spec.input_shape.as_tuple();
    writeln!(f, "输入: ({}, {}, {})", h, w, c)?;
    if let Some(augmentation) = &self.augmentation {
      writeln!(f, "数据增强: {:?}", augmentation.config())?;
    }
    writeln!(f, "预处理: ImageNet 归一化")?;
    writeln!(
      f,
      "骨干网络: {:?} ({} 维特征, {})",
      self.backbone.kind(),
      self.spec.backbone.feature_dim(),
      if self.spec.train_all { "可训练" } else { "冻结" }
    )?;
    writeln!(f, "Dropout: {}", self.spec.dropout_rate)?;
    write!(
      f,
      "分类头: {} 单元, softmax, l1={}, l2={}",
      self.head_units(),
      self.spec.l1,
      self.spec.l2
    )
  }
}
