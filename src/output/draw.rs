// 该文件是 Shijian （食鉴） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use thiserror::Error;
use tracing::info;

use crate::model::{DetectItem, DetectResult, WithLabel};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const PALETTE_SIZE: usize = 80;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(String),
}

#[derive(Clone)]
pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: Option<FontArc>,
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    // 每个类别一种颜色
    let colors = (0..PALETTE_SIZE)
      .map(|i| {
        let hue = (i as f32 / PALETTE_SIZE as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      font: None,
      colors,
    }
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl std::fmt::Debug for Draw {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Draw")
      .field("font_size", &self.font_size)
      .field("has_font", &self.font.is_some())
      .finish_non_exhaustive()
  }
}

impl Draw {
  /// 加载 TrueType 字体，用于绘制类别标签
  pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data).map_err(|e| DrawError::InvalidFont(e.to_string()))?;
    info!("加载标签字体: {}", path.display());
    self.font = Some(font);
    Ok(self)
  }

  pub fn color_of(&self, label_id: u32) -> Rgb<u8> {
    self.colors[label_id as usize % self.colors.len()]
  }

  // 在图像上绘制一个矩形边框，bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(&self, image: &mut RgbImage, item: &DetectItem<T>) {
    let DetectItem { kind, score, bbox } = item;
    let color = self.color_of(kind.to_label_id());
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = ((bbox[0] * w as f32).floor() as i32).clamp(0, w - 1);
    let y_min = ((bbox[1] * h as f32).floor() as i32).clamp(0, h - 1);
    let x_max = ((bbox[2] * w as f32).ceil() as i32).clamp(0, w - 1);
    let y_max = ((bbox[3] * h as f32).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 绘制边框（加粗）
    for thickness in 0..BOX_THICKNESS {
      let x_min_t = (x_min + thickness).min(x_max);
      let y_min_t = (y_min + thickness).min(y_max);
      let x_max_t = (x_max - thickness).max(x_min);
      let y_max_t = (y_max - thickness).max(y_min);

      for x in x_min_t..=x_max_t {
        image.put_pixel(x as u32, y_min_t as u32, color);
        image.put_pixel(x as u32, y_max_t as u32, color);
      }
      for y in y_min_t..=y_max_t {
        image.put_pixel(x_min_t as u32, y as u32, color);
        image.put_pixel(x_max_t as u32, y as u32, color);
      }
    }

    let Some(font) = &self.font else {
      return;
    };

    let label = format!("{} {:.2}", kind.to_label_str(), score);
    let text_width = (label.len() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签位于边框上方
    let label_x = x_min;
    let label_y = (y_min - text_height).max(0);
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = text_height as u32;

    if label_width > 0 {
      let rect = imageproc::rect::Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);

      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        label_x,
        label_y + self.label_text_vertical_padding,
        PxScale::from(self.font_size),
        font,
        &label,
      );
    }
  }

  pub fn draw_detections_on_image<T: WithLabel>(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }

  pub fn draw_detection<T: WithLabel>(&self, frame: &RgbImage, result: &DetectResult<T>) -> RgbImage {
    let mut image = frame.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CocoLabel;

  fn apple_at(bbox: [f32; 4]) -> DetectResult<CocoLabel> {
    DetectResult::from(vec![DetectItem {
      kind: CocoLabel::from_label_id(47),
      score: 0.9,
      bbox,
    }])
  }

  #[test]
  fn draws_box_edges_without_touching_inside() {
    let draw = Draw::default();
    let frame = RgbImage::new(100, 100);
    let image = draw.draw_detection(&frame, &apple_at([0.2, 0.2, 0.8, 0.8]));
    let color = draw.color_of(47);

    assert_eq!(*image.get_pixel(20, 20), color);
    assert_eq!(*image.get_pixel(50, 21), color);
    assert_eq!(*image.get_pixel(80, 50), color);
    assert_eq!(*image.get_pixel(50, 50), Rgb([0, 0, 0]));
    // 原图不变
    assert_eq!(*frame.get_pixel(20, 20), Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let draw = Draw::default();
    let frame = RgbImage::new(10, 10);
    let image = draw.draw_detection(&frame, &apple_at([0.5, 0.5, 0.5, 0.5]));
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn box_outside_image_is_clamped() {
    let draw = Draw::default();
    let frame = RgbImage::new(10, 10);
    let image = draw.draw_detection(&frame, &apple_at([-1.0, -1.0, 2.0, 2.0]));
    assert_eq!(*image.get_pixel(0, 0), draw.color_of(47));
    assert_eq!(*image.get_pixel(9, 9), draw.color_of(47));
  }

  #[test]
  fn palette_differs_between_classes() {
    let draw = Draw::default();
    assert_ne!(draw.color_of(46), draw.color_of(47));
    assert_eq!(draw.color_of(47), draw.color_of(47 + 80));
  }

  #[test]
  fn missing_font_file_is_reported() {
    let err = Draw::default().with_font_file("/nonexistent/font.ttf").unwrap_err();
    assert!(matches!(err, DrawError::IoError(_)));
  }
}
