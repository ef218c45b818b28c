// 该文件是 Shijian （食鉴） 项目的一部分。
// src/frame.rs - Letterbox NCHW 帧定义
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

use image::{
  Rgb, RgbImage,
  imageops::{self, FilterType},
};
use ndarray::Array4;

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];

/// 保持宽高比缩放并填充到正方形的模型输入帧
#[derive(Debug, Clone)]
pub struct LetterboxFrame {
  data: Array4<f32>,
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  source_width: u32,
  source_height: u32,
}

impl LetterboxFrame {
  pub fn from_rgb_image(image: &RgbImage, size: u32) -> Self {
    let (source_width, source_height) = image.dimensions();
    let scale = (size as f32 / source_width as f32).min(size as f32 / source_height as f32);
    let new_width = ((source_width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((source_height as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);
    let pad_x = (size - new_width) / 2;
    let pad_y = (size - new_height) / 2;

    let mut canvas = RgbImage::from_pixel(size, size, Rgb(LETTERBOX_FILL));
    imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    // 转为 NCHW，并归一化到 [0, 1]
    let side = size as usize;
    let mut data = Array4::<f32>::zeros((1, RGB_CHANNELS, side, side));
    for (x, y, pixel) in canvas.enumerate_pixels() {
      for c in 0..RGB_CHANNELS {
        data[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data,
      scale,
      pad_x: pad_x as f32,
      pad_y: pad_y as f32,
      source_width,
      source_height,
    }
  }

  pub fn as_nchw(&self) -> &Array4<f32> {
    &self.data
  }

  /// 将模型输入空间的像素坐标 [x_min, y_min, x_max, y_max] 映射回原图的归一化坐标
  pub fn restore_bbox(&self, bbox: [f32; 4]) -> [f32; 4] {
    let w = self.source_width as f32;
    let h = self.source_height as f32;
    let x = |v: f32| ((v - self.pad_x) / self.scale).clamp(0.0, w) / w;
    let y = |v: f32| ((v - self.pad_y) / self.scale).clamp(0.0, h) / h;
    [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wide_image_is_padded_vertically() {
    let image = RgbImage::from_pixel(200, 100, Rgb([255, 0, 0]));
    let frame = LetterboxFrame::from_rgb_image(&image, 64);

    assert_eq!(frame.as_nchw().shape(), &[1, 3, 64, 64]);
    // 上方填充区域为灰色
    let fill = 114.0 / 255.0;
    assert!((frame.as_nchw()[[0, 0, 0, 32]] - fill).abs() < 1e-6);
    // 中心区域为红色
    assert!((frame.as_nchw()[[0, 0, 32, 32]] - 1.0).abs() < 1e-6);
    assert!(frame.as_nchw()[[0, 1, 32, 32]].abs() < 1e-6);
  }

  #[test]
  fn restore_bbox_undoes_letterbox() {
    let image = RgbImage::new(200, 100);
    let frame = LetterboxFrame::from_rgb_image(&image, 64);

    // scale = 0.32, 内容高度 32，上下各填充 16
    let restored = frame.restore_bbox([0.0, 16.0, 32.0, 48.0]);
    let expected = [0.0, 0.0, 0.5, 1.0];
    for (got, want) in restored.iter().zip(expected) {
      assert!((got - want).abs() < 1e-4, "{restored:?}");
    }
  }

  #[test]
  fn restore_bbox_clamps_into_image() {
    let image = RgbImage::new(100, 100);
    let frame = LetterboxFrame::from_rgb_image(&image, 50);

    let restored = frame.restore_bbox([-10.0, -10.0, 80.0, 80.0]);
    assert_eq!(restored, [0.0, 0.0, 1.0, 1.0]);
  }
}
