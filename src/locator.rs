// 该文件是 Cheying （车影） 项目的一部分。
// src/locator.rs - 车辆定位
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::{FrameError, RgbFrame},
  model::{CocoLabel, DetectResult, Model, WithLabel},
};

#[derive(Error, Debug)]
pub enum LocateError {
  #[error("图像无效: {0}")]
  InvalidImage(#[from] FrameError),
  #[error("检测器错误: {0}")]
  Detector(Box<dyn std::error::Error + Send + Sync>),
}

/// 车辆边界框，像素坐标 (left, top, right, bottom)
///
/// 始终满足 `left < right <= width` 与 `top < bottom <= height`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VehicleBox {
  pub left: u32,
  pub top: u32,
  pub right: u32,
  pub bottom: u32,
}

impl VehicleBox {
  /// 覆盖整张图像的边界框
  pub fn full(width: u32, height: u32) -> Self {
    Self {
      left: 0,
      top: 0,
      right: width,
      bottom: height,
    }
  }

  /// 将浮点边界框裁剪到图像范围内并截断为整数，结果为空时返回 None
  pub fn from_bbox(bbox: [f32; 4], width: u32, height: u32) -> Option<Self> {
    let (w, h) = (width as f32, height as f32);
    let left = bbox[0].clamp(0.0, w) as u32;
    let top = bbox[1].clamp(0.0, h) as u32;
    let right = bbox[2].clamp(0.0, w) as u32;
    let bottom = bbox[3].clamp(0.0, h) as u32;

    (left < right && top < bottom).then_some(Self {
      left,
      top,
      right,
      bottom,
    })
  }

  pub fn width(&self) -> u32 {
    self.right - self.left
  }

  pub fn height(&self) -> u32 {
    self.bottom - self.top
  }

  pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
    (self.left, self.top, self.right, self.bottom)
  }
}

/// 在检测结果中挑选面积最大的车辆，没有车辆时返回整图
///
/// 面积相同时保留检测器输出中靠前的一个。
pub fn select_vehicle(result: &DetectResult<CocoLabel>, width: u32, height: u32) -> VehicleBox {
  let mut best: Option<(f32, VehicleBox)> = None;

  for item in result.items.iter().filter(|item| item.kind.is_vehicle()) {
    let Some(vehicle) = VehicleBox::from_bbox(item.bbox, width, height) else {
      debug!("忽略退化的边界框: {:?}", item.bbox);
      continue;
    };

    let area = item.area();
    if best.is_none_or(|(best_area, _)| area > best_area) {
      debug!(
        "候选车辆 {} {:.2}: {:?}, 面积 {:.1}",
        item.kind.to_label_str(),
        item.score,
        vehicle,
        area
      );
      best = Some((area, vehicle));
    }
  }

  best
    .map(|(_, vehicle)| vehicle)
    .unwrap_or_else(|| VehicleBox::full(width, height))
}

/// 运行检测器并返回图像中最显著车辆的边界框
pub fn locate_vehicle<M>(detector: &M, frame: &RgbFrame) -> Result<VehicleBox, LocateError>
where
  M: Model<Input = RgbFrame, Output = DetectResult<CocoLabel>>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let (width, height) = (frame.width() as u32, frame.height() as u32);

  let result = detector
    .infer(frame)
    .map_err(|e| LocateError::Detector(Box::new(e)))?;
  debug!("检测到 {} 个物体", result.len());

  let vehicle = select_vehicle(&result, width, height);
  info!("车辆位置: {:?}", vehicle.as_tuple());
  Ok(vehicle)
}

/// 从原始 RGB 缓冲 (height, width, channels) 定位车辆
pub fn locate_vehicle_raw<M>(
  detector: &M,
  height: usize,
  width: usize,
  channels: usize,
  data: Vec<u8>,
) -> Result<VehicleBox, LocateError>
where
  M: Model<Input = RgbFrame, Output = DetectResult<CocoLabel>>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let frame = RgbFrame::from_raw(height, width, channels, data)?;
  locate_vehicle(detector, &frame)
}

/// 按车辆边界框裁剪图像
pub fn crop_vehicle(image: &RgbImage, vehicle: &VehicleBox) -> RgbImage {
  image::imageops::crop_imm(
    image,
    vehicle.left,
    vehicle.top,
    vehicle.width(),
    vehicle.height(),
  )
  .to_image()
}
