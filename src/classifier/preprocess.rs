// 该文件是 Cheying （车影） 项目的一部分。
// src/classifier/preprocess.rs - 骨干网络输入预处理
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

use candle_core::{DType, Device, Tensor};
use image::RgbImage;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ImageNet 归一化，同时将 NHWC 转为骨干网络需要的 NCHW
#[derive(Debug, Clone)]
pub struct ImageNetNormalize {
  mean: Tensor,
  std: Tensor,
}

impl ImageNetNormalize {
  pub fn new(device: &Device) -> candle_core::Result<Self> {
    let mean = Tensor::new(&IMAGENET_MEAN, device)?.reshape((1, 3, 1, 1))?;
    let std = Tensor::new(&IMAGENET_STD, device)?.reshape((1, 3, 1, 1))?;
    Ok(Self { mean, std })
  }

  /// 输入为 0..255 的 (batch, 高, 宽, 3) 张量
  pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
    xs.permute((0, 3, 1, 2))?
      .contiguous()?
      .affine(1.0 / 255.0, 0.0)?
      .broadcast_sub(&self.mean)?
      .broadcast_div(&self.std)
  }
}

/// 将 RGB 图像转换为 (1, 高, 宽, 3) 的 f32 张量，像素值保持 0..255
pub fn image_to_tensor(image: &RgbImage, device: &Device) -> candle_core::Result<Tensor> {
  let (width, height) = image.dimensions();
  let data = image.as_raw().clone();
  Tensor::from_vec(data, (1, height as usize, width as usize, 3), device)?.to_dtype(DType::F32)
}
