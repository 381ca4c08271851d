// 该文件是 Cheying （车影） 项目的一部分。
// tests/classifier.rs - 分类模型构建测试
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

use candle_core::{DType, Device, Tensor};
use cheying::classifier::{
  AugmentationConfig, BackboneKind, BackboneWeights, ClassifierConfig, ClassifierError,
  ClassifierModel, Factor, FreshInit, RandomFlip, RandomRotation, RandomZoom, build_model,
};
use image::RgbImage;

const SIDE: usize = 32;

/// 不依赖网络的小模型配置
fn small_fresh(classes: usize) -> FreshInit {
  FreshInit::new(classes)
    .with_backbone(BackboneKind::ResNet18)
    .with_weights(BackboneWeights::Random)
    .with_input_shape([SIDE, SIDE, 3])
}

fn build_fresh(fresh: FreshInit) -> ClassifierModel {
  build_model(&ClassifierConfig::FreshInit(fresh), &Device::Cpu).unwrap()
}

fn sample_batch(batch: usize) -> Tensor {
  Tensor::rand(0f32, 255f32, (batch, SIDE, SIDE, 3), &Device::Cpu).unwrap()
}

fn assert_probabilities(probs: &Tensor, batch: usize, classes: usize) {
  assert_eq!(probs.dims(), &[batch, classes]);
  for row in probs.to_vec2::<f32>().unwrap() {
    assert!(row.iter().all(|p| (0.0..=1.0).contains(p)), "{:?}", row);
    let sum: f32 = row.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4, "{}", sum);
  }
}

#[test]
fn head_matches_class_count() {
  for classes in [1, 2, 5] {
    let model = build_fresh(small_fresh(classes));
    assert_eq!(model.head_units(), classes);

    let probs = model.forward(&sample_batch(2)).unwrap();
    assert_probabilities(&probs, 2, classes);
  }
}

#[test]
fn small_inputs_are_configuration_errors() {
  // 默认使用 ImageNet 权重，校验必须在下载之前完成
  for shape in [[31, 224, 3], [224, 31, 3], [1, 1, 3]] {
    let config = ClassifierConfig::FreshInit(FreshInit::new(3).with_input_shape(shape));
    let err = build_model(&config, &Device::Cpu).err().unwrap();
    assert!(matches!(err, ClassifierError::Configuration(_)), "{}", err);
  }
}

#[test]
fn saved_model_round_trips() {
  let dir = tempfile::tempdir().unwrap();
  let model = build_fresh(small_fresh(4).with_dropout_rate(0.5).with_regularization(0.01, 0.001));
  let xs = sample_batch(3);
  let expected = model.forward(&xs).unwrap().to_vec2::<f32>().unwrap();

  model.save(dir.path()).unwrap();
  let config = ClassifierConfig::LoadExisting {
    path: dir.path().to_path_buf(),
  };
  let loaded = build_model(&config, &Device::Cpu).unwrap();
  assert_eq!(loaded.spec(), model.spec());

  let actual = loaded.forward(&xs).unwrap().to_vec2::<f32>().unwrap();
  for (row_a, row_e) in actual.iter().zip(expected.iter()) {
    for (a, e) in row_a.iter().zip(row_e.iter()) {
      assert!((a - e).abs() <= 1e-5, "{} != {}", a, e);
    }
  }
}

#[test]
fn missing_model_is_a_load_error() {
  let config = ClassifierConfig::LoadExisting {
    path: PathBuf::from("/nonexistent/cheying/model"),
  };
  let err = build_model(&config, &Device::Cpu).err().unwrap();
  assert!(matches!(err, ClassifierError::ModelLoad { .. }));
}

#[test]
fn corrupted_model_is_a_load_error() {
  let dir = tempfile::tempdir().unwrap();
  build_fresh(small_fresh(2)).save(dir.path()).unwrap();

  let spec_path = dir.path().join("classifier.json");
  let content = std::fs::read_to_string(&spec_path).unwrap();
  std::fs::write(
    &spec_path,
    content.replace("\"format_version\": 1", "\"format_version\": 99"),
  )
  .unwrap();
  let err = ClassifierModel::load(dir.path(), &Device::Cpu).err().unwrap();
  assert!(matches!(err, ClassifierError::ModelLoad { .. }));

  std::fs::write(&spec_path, "not json").unwrap();
  let err = ClassifierModel::load(dir.path(), &Device::Cpu).err().unwrap();
  assert!(matches!(err, ClassifierError::ModelLoad { .. }));
}

#[test]
fn missing_weight_file_is_a_load_error() {
  let dir = tempfile::tempdir().unwrap();
  build_fresh(small_fresh(2)).save(dir.path()).unwrap();
  std::fs::remove_file(dir.path().join("head.safetensors")).unwrap();

  let err = ClassifierModel::load(dir.path(), &Device::Cpu).err().unwrap();
  assert!(matches!(err, ClassifierError::ModelLoad { .. }));
}

#[test]
fn local_backbone_weights_are_loaded() {
  let dir = tempfile::tempdir().unwrap();
  build_fresh(small_fresh(2)).save(dir.path()).unwrap();

  let weights = BackboneWeights::ImageNet {
    file: Some(dir.path().join("backbone.safetensors")),
  };
  let model = build_fresh(small_fresh(3).with_weights(weights));
  assert_eq!(model.head_units(), 3);

  // 分类头文件缺少骨干网络参数
  let weights = BackboneWeights::ImageNet {
    file: Some(dir.path().join("head.safetensors")),
  };
  let config = ClassifierConfig::FreshInit(small_fresh(3).with_weights(weights));
  let err = build_model(&config, &Device::Cpu).err().unwrap();
  assert!(matches!(err, ClassifierError::ModelLoad { .. }));
}

#[test]
fn frozen_backbone_only_trains_the_head() {
  let frozen = build_fresh(small_fresh(3));
  assert_eq!(frozen.trainable_vars().len(), 2);

  let trainable = build_fresh(small_fresh(3).with_train_all(true));
  assert!(trainable.trainable_vars().len() > 2);
}

#[test]
fn regularization_follows_coefficients() {
  let model = build_fresh(small_fresh(3));
  let loss = model.regularization_loss().unwrap().to_scalar::<f32>().unwrap();
  assert_eq!(loss, 0.0);

  let model = build_fresh(small_fresh(3).with_regularization(1.0, 0.0));
  let loss = model.regularization_loss().unwrap().to_scalar::<f32>().unwrap();
  assert!(loss > 0.0);
}

#[test]
fn augmentation_is_only_used_in_training() {
  let augmentation = AugmentationConfig {
    random_flip: Some(RandomFlip::default()),
    random_rotation: Some(RandomRotation {
      factor: Factor::Symmetric(0.2),
    }),
    random_zoom: Some(RandomZoom {
      height_factor: Factor::Range([-0.2, 0.3]),
      width_factor: None,
    }),
    seed: Some(7),
  };
  let model = build_fresh(small_fresh(3).with_augmentation(Some(augmentation)));
  assert!(model.has_augmentation());

  let xs = sample_batch(2);
  let probs = model.forward_t(&xs, true).unwrap();
  assert_probabilities(&probs, 2, 3);

  let first = model.forward(&xs).unwrap().to_vec2::<f32>().unwrap();
  let second = model.forward(&xs).unwrap().to_vec2::<f32>().unwrap();
  assert_eq!(first, second);
}

#[test]
fn empty_augmentation_is_skipped() {
  let model = build_fresh(small_fresh(2).with_augmentation(Some(AugmentationConfig::default())));
  assert!(!model.has_augmentation());
}

#[test]
fn mismatched_input_is_rejected() {
  let model = build_fresh(small_fresh(2));
  let cases = [
    Tensor::zeros((1, SIDE, SIDE + 1, 3), DType::F32, &Device::Cpu).unwrap(),
    Tensor::zeros((1, SIDE, SIDE, 1), DType::F32, &Device::Cpu).unwrap(),
    Tensor::zeros((SIDE, SIDE, 3), DType::F32, &Device::Cpu).unwrap(),
  ];
  for xs in cases {
    let err = model.forward(&xs).err().unwrap();
    assert!(matches!(err, ClassifierError::InvalidImage(_)));
  }
}

#[test]
fn images_are_resized_before_prediction() {
  let model = build_fresh(small_fresh(4));
  let image = RgbImage::from_fn(50, 40, |x, y| image::Rgb([x as u8 * 5, y as u8 * 6, 128]));
  let probs = model.predict_image(&image).unwrap();
  assert_eq!(probs.len(), 4);
  assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
}
