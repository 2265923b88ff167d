// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/output/draw.rs - 检测结果标注
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

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};

use crate::model::Detection;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const BOX_THICKNESS: i32 = 2;

pub struct Draw<'a> {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  font: FontRef<'a>,
  box_color: [u8; 3],
}

impl Default for Draw<'_> {
  fn default() -> Self {
    let font_data = include_bytes!("../../assets/font.ttf"); // default font
    let font = FontRef::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      box_color: BOX_COLOR,
      font,
    }
  }
}

impl Draw<'_> {
  /// 按检测集合顺序依次绘制边框与标签，后绘制的标签覆盖先绘制的
  pub fn annotate(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      self.draw_bbox_with_label(
        image,
        &detection.bbox,
        &detection.label,
        detection.score,
        self.box_color,
      );
    }
  }

  // 绘制一个矩形边框及其上方的标签，bbox 为像素坐标 [x, y, w, h]。
  // 越界坐标一律收缩到图像范围内，不会中断流水线。
  fn draw_bbox_with_label(
    &self,
    image: &mut RgbImage,
    bbox: &[f32; 4],
    label: &str,
    score: f32,
    color: [u8; 3],
  ) {
    let (w, h) = (image.width() as i32, image.height() as i32);

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = ((bbox[0] + bbox[2]).ceil() as i32).clamp(0, w - 1);
    let y_max = ((bbox[1] + bbox[3]).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 边框加粗绘制
    for thickness in 0..BOX_THICKNESS {
      let x0 = (x_min + thickness).min(w - 1);
      let y0 = (y_min + thickness).min(h - 1);
      let x1 = (x_max - thickness).max(0);
      let y1 = (y_max - thickness).max(0);
      if x0 > x1 || y0 > y1 {
        break;
      }

      for x in x0..=x1 {
        image.put_pixel(x as u32, y0 as u32, Rgb(color));
        image.put_pixel(x as u32, y1 as u32, Rgb(color));
      }
      for y in y0..=y1 {
        image.put_pixel(x0 as u32, y as u32, Rgb(color));
        image.put_pixel(x1 as u32, y as u32, Rgb(color));
      }
    }

    // 标签文本锚定在边框上沿之上
    let text = format!("{}: {:.2}", label, score);
    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]);

    let text_width = (text.len() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    let label_x = x_min.max(0);
    let label_y = (y_min - text_height).max(0);

    let max_width = (w - label_x).max(0);
    let label_width = text_width.min(max_width) as u32;
    let label_height = text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect =
        imageproc::rect::Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, Rgb(color));
      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        &self.font,
        &text,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(bbox: [f32; 4]) -> Detection {
    Detection {
      label: "traffic light".to_string(),
      score: 0.87,
      bbox,
    }
  }

  #[test]
  fn empty_detection_set_leaves_image_untouched() {
    let draw = Draw::default();
    let mut image = RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8, y as u8, 7]));
    let before = image.clone();

    draw.annotate(&mut image, &[]);
    assert_eq!(image.as_raw(), before.as_raw());
  }

  #[test]
  fn annotation_changes_pixels() {
    let draw = Draw::default();
    let mut image = RgbImage::from_pixel(128, 128, Rgb([0, 0, 0]));
    let before = image.clone();

    draw.annotate(&mut image, &[detection([30.0, 40.0, 50.0, 50.0])]);
    assert_ne!(image.as_raw(), before.as_raw());
    // 边框左上角落在期望位置
    assert_eq!(image.get_pixel(30, 40), &Rgb(BOX_COLOR));
  }

  #[test]
  fn out_of_bounds_box_does_not_panic() {
    let draw = Draw::default();
    let mut image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));

    draw.annotate(
      &mut image,
      &[
        detection([-100.0, -100.0, 400.0, 400.0]),
        detection([60.0, 60.0, 500.0, 500.0]),
        detection([1000.0, 1000.0, 10.0, 10.0]),
      ],
    );
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let draw = Draw::default();
    let mut image = RgbImage::from_pixel(64, 64, Rgb([9, 9, 9]));
    let before = image.clone();

    draw.annotate(&mut image, &[detection([30.0, 30.0, 0.0, 0.0])]);
    assert_eq!(image.as_raw(), before.as_raw());
  }
}
