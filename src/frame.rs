// 该文件是 Cheying （车影） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use crate::input::AsNhwcFrame;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("图像无效: {0}")]
  InvalidImage(String),
}

/// RGB 图像帧，数据按 (高, 宽, 通道) 排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 从原始像素缓冲构造帧，形状为 (height, width, channels)
  pub fn from_raw(
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if channels != RGB_CHANNELS {
      return Err(FrameError::InvalidImage(format!(
        "通道数必须为 {}, 实际为 {}",
        RGB_CHANNELS, channels
      )));
    }

    if height == 0 || width == 0 {
      return Err(FrameError::InvalidImage(format!(
        "图像尺寸不能为空: {}x{}",
        width, height
      )));
    }

    let expected = width
      .checked_mul(height)
      .and_then(|n| n.checked_mul(RGB_CHANNELS))
      .ok_or_else(|| {
        FrameError::InvalidImage(format!("图像尺寸溢出: {}x{}", width, height))
      })?;
    if data.len() != expected {
      return Err(FrameError::InvalidImage(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    // 长度在构造时已校验
    RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
      let index = (y as usize * self.width + x as usize) * RGB_CHANNELS;
      image::Rgb([
        self.data[index],
        self.data[index + 1],
        self.data[index + 2],
      ])
    })
  }
}

impl TryFrom<RgbImage> for RgbFrame {
  type Error = FrameError;

  fn try_from(image: RgbImage) -> Result<Self, Self::Error> {
    let (width, height) = image.dimensions();
    Self::from_raw(
      height as usize,
      width as usize,
      RGB_CHANNELS,
      image.into_raw(),
    )
  }
}

impl AsNhwcFrame for RgbFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_raw_accepts_matching_buffer() {
    let frame = RgbFrame::from_raw(2, 4, 3, vec![0u8; 24]).unwrap();
    assert_eq!(frame.height(), 2);
    assert_eq!(frame.width(), 4);
    assert_eq!(frame.channels(), 3);
    assert_eq!(frame.as_nhwc().len(), 24);
  }

  #[test]
  fn from_raw_rejects_wrong_channels() {
    let err = RgbFrame::from_raw(2, 2, 4, vec![0u8; 16]).unwrap_err();
    assert!(matches!(err, FrameError::InvalidImage(_)));
  }

  #[test]
  fn from_raw_rejects_wrong_length() {
    assert!(RgbFrame::from_raw(2, 2, 3, vec![0u8; 11]).is_err());
  }

  #[test]
  fn from_raw_rejects_empty_image() {
    assert!(RgbFrame::from_raw(0, 5, 3, Vec::new()).is_err());
  }

  #[test]
  fn rgb_image_round_trip_keeps_pixels() {
    let image = RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8, y as u8, 7]));
    let frame = RgbFrame::try_from(image.clone()).unwrap();
    assert_eq!(frame.to_rgb_image(), image);
  }
}
