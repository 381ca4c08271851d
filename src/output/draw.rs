// 该文件是 Cheying （车影） 项目的一部分。
// src/output/draw.rs - 车辆边界框可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::locator::VehicleBox;

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: u32 = 2;

pub struct Draw {
  color: [u8; 3],
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  /// 在图像上绘制车辆边框，向内加粗
  pub fn draw_vehicle(&self, image: &mut RgbImage, vehicle: &VehicleBox) {
    for t in 0..self.thickness {
      let width = vehicle.width().saturating_sub(2 * t);
      let height = vehicle.height().saturating_sub(2 * t);
      if width == 0 || height == 0 {
        break;
      }

      let rect = Rect::at((vehicle.left + t) as i32, (vehicle.top + t) as i32).of_size(width, height);
      draw_hollow_rect_mut(image, rect, Rgb(self.color));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn draws_box_edges_only() {
    let mut image = RgbImage::new(20, 20);
    let vehicle = VehicleBox::from_bbox([2.0, 2.0, 12.0, 12.0], 20, 20).unwrap();
    Draw::default().draw_vehicle(&mut image, &vehicle);

    assert_eq!(image.get_pixel(2, 2), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(3, 3), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(7, 7), &Rgb([0, 0, 0]));
  }
}
