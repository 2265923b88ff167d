// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/model/yolov8.rs - 交通标志检测模型（YOLOv8）
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
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::model::labels::{LabelError, LabelTable};
use crate::model::{Detection, Model};

const YOLOV8_INPUT: u32 = 640;
const YOLOV8_ROW_FIELDS: usize = 6; // x1, y1, x2, y2, confidence, class_id
const LETTERBOX_FILL: u8 = 114;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

type OnnxPlan = RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("类别表错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("模型输出形状无效: {0:?}，期望 [1, N, 6]")]
  OutputShape(Vec<usize>),
}

impl Yolov8Error {
  fn load(err: TractError) -> Self {
    Yolov8Error::ModelLoadError(format!("{err:?}"))
  }

  fn infer(err: TractError) -> Self {
    Yolov8Error::InferenceError(format!("{err:?}"))
  }
}

/// 信箱缩放参数
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
  pub scale: f32,
  pub scaled_w: u32,
  pub scaled_h: u32,
  pub pad_x: u32,
  pub pad_y: u32,
}

/// 计算保持纵横比缩放到 size x size 画布所需的参数
pub fn letterbox_params(width: u32, height: u32, size: u32) -> Letterbox {
  let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
  let scaled_w = ((width as f32 * scale).round() as u32).clamp(1, size);
  let scaled_h = ((height as f32 * scale).round() as u32).clamp(1, size);
  Letterbox {
    scale,
    scaled_w,
    scaled_h,
    pad_x: (size - scaled_w) / 2,
    pad_y: (size - scaled_h) / 2,
  }
}

/// 将信箱空间的 [x1, y1, x2, y2] 还原为原图像素空间的 [x, y, w, h]
pub fn restore_rect(rect: [f32; 4], lb: &Letterbox, width: u32, height: u32) -> [f32; 4] {
  let x1 = ((rect[0] - lb.pad_x as f32) / lb.scale).clamp(0.0, width as f32);
  let y1 = ((rect[1] - lb.pad_y as f32) / lb.scale).clamp(0.0, height as f32);
  let x2 = ((rect[2] - lb.pad_x as f32) / lb.scale).clamp(0.0, width as f32);
  let y2 = ((rect[3] - lb.pad_y as f32) / lb.scale).clamp(0.0, height as f32);
  [x1, y1, x2 - x1, y2 - y1]
}

pub struct Yolov8Builder {
  model_path: String,
  labels_path: String,
  confidence_threshold: f32,
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<String>, labels_path: impl Into<String>) -> Self {
    Yolov8Builder {
      model_path: model_path.into(),
      labels_path: labels_path.into(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<Yolov8, Yolov8Error> {
    info!("加载交通标志检测模型: {}", self.model_path);

    let labels = LabelTable::from_file(&self.labels_path)?;

    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(Yolov8Error::load)?
      .with_input_fact(
        0,
        f32::fact([1, 3, YOLOV8_INPUT as usize, YOLOV8_INPUT as usize]).into(),
      )
      .map_err(Yolov8Error::load)?
      .into_optimized()
      .map_err(Yolov8Error::load)?
      .into_runnable()
      .map_err(Yolov8Error::load)?;

    info!("交通标志检测模型加载完成");
    Ok(Yolov8 {
      plan,
      labels,
      confidence_threshold: self.confidence_threshold,
    })
  }
}

/// 现代多类别检测器：网络自身已完成框合并，输出逐条检测记录
pub struct Yolov8 {
  plan: OnnxPlan,
  labels: LabelTable,
  confidence_threshold: f32,
}

impl Yolov8 {
  /// 信箱缩放到网络输入分辨率，灰底填充，像素缩放到 [0,1]，通道序为 NCHW
  fn preprocess(&self, image: &RgbImage) -> (Tensor, Letterbox) {
    let lb = letterbox_params(image.width(), image.height(), YOLOV8_INPUT);
    let resized = image::imageops::resize(
      image,
      lb.scaled_w,
      lb.scaled_h,
      image::imageops::FilterType::Triangle,
    );
    let mut canvas =
      RgbImage::from_pixel(YOLOV8_INPUT, YOLOV8_INPUT, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(&mut canvas, &resized, lb.pad_x as i64, lb.pad_y as i64);

    let tensor: Tensor = tract_ndarray::Array4::from_shape_fn(
      (1, 3, YOLOV8_INPUT as usize, YOLOV8_INPUT as usize),
      |(_, c, y, x)| canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    )
    .into();
    (tensor, lb)
  }
}

impl Model for Yolov8 {
  type Output = Vec<Detection>;
  type Error = Yolov8Error;

  fn infer(&self, image: &RgbImage) -> Result<Self::Output, Self::Error> {
    debug!(
      "信箱缩放: {}x{} -> {}x{}",
      image.width(),
      image.height(),
      YOLOV8_INPUT,
      YOLOV8_INPUT
    );
    let (input, lb) = self.preprocess(image);

    debug!("执行前向推理");
    let outputs = self
      .plan
      .run(tvec!(input.into()))
      .map_err(Yolov8Error::infer)?;

    let view = outputs[0]
      .to_array_view::<f32>()
      .map_err(Yolov8Error::infer)?;
    let shape = view.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 || shape[2] != YOLOV8_ROW_FIELDS {
      return Err(Yolov8Error::OutputShape(shape));
    }

    let mut detections = Vec::new();
    for row in view.index_axis(tract_ndarray::Axis(0), 0).outer_iter() {
      let score = row[4];
      if score <= self.confidence_threshold {
        continue;
      }
      let class_id = row[5] as u32;
      detections.push(Detection {
        label: self.labels.name(class_id).to_string(),
        score,
        bbox: restore_rect(
          [row[0], row[1], row[2], row[3]],
          &lb,
          image.width(),
          image.height(),
        ),
      });
    }

    // 结果按置信度降序，相同置信度保持网络输出顺序
    detections.sort_by(|a, b| {
      b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!("检测到 {} 个交通标志", detections.len());
    Ok(detections)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn letterbox_wide_image_pads_vertically() {
    let lb = letterbox_params(1280, 720, 640);
    assert!((lb.scale - 0.5).abs() < 1e-6);
    assert_eq!(lb.scaled_w, 640);
    assert_eq!(lb.scaled_h, 360);
    assert_eq!(lb.pad_x, 0);
    assert_eq!(lb.pad_y, 140);
  }

  #[test]
  fn letterbox_square_image_has_no_padding() {
    let lb = letterbox_params(416, 416, 640);
    assert_eq!(lb.scaled_w, 640);
    assert_eq!(lb.scaled_h, 640);
    assert_eq!(lb.pad_x, 0);
    assert_eq!(lb.pad_y, 0);
  }

  #[test]
  fn restore_rect_inverts_letterbox() {
    let lb = letterbox_params(1280, 720, 640);
    // 原图中心处 100x50 的框，经信箱变换后再还原
    let x1 = 590.0 * lb.scale + lb.pad_x as f32;
    let y1 = 335.0 * lb.scale + lb.pad_y as f32;
    let x2 = 690.0 * lb.scale + lb.pad_x as f32;
    let y2 = 385.0 * lb.scale + lb.pad_y as f32;

    let [x, y, w, h] = restore_rect([x1, y1, x2, y2], &lb, 1280, 720);
    assert!((x - 590.0).abs() <= 1.0);
    assert!((y - 335.0).abs() <= 1.0);
    assert!((w - 100.0).abs() <= 1.0);
    assert!((h - 50.0).abs() <= 1.0);
  }

  #[test]
  fn restore_rect_clamps_out_of_bounds() {
    let lb = letterbox_params(100, 100, 640);
    let [x, y, w, h] = restore_rect([-50.0, -50.0, 7000.0, 7000.0], &lb, 100, 100);
    assert_eq!([x, y], [0.0, 0.0]);
    assert_eq!([w, h], [100.0, 100.0]);
  }
}
