// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/model/yolov3.rs - 红绿灯检测模型（YOLOv3）
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
use tract_onnx::prelude::*;

use crate::model::labels::{LabelError, LabelTable};
use crate::model::{Candidate, Model};

const YOLOV3_INPUT_W: u32 = 416;
const YOLOV3_INPUT_H: u32 = 416;
const YOLOV3_BOX_FIELDS: usize = 5; // cx, cy, w, h, objectness
const DEFAULT_TARGET_LABEL: &str = "traffic light";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

type OnnxPlan = RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Error, Debug)]
pub enum Yolov3Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("类别表错误: {0}")]
  LabelError(#[from] LabelError),
  #[error("目标类别 \"{0}\" 不在类别表中")]
  TargetMissing(String),
  #[error("模型输出长度 {0} 不是单元长度 {1} 的整数倍")]
  OutputShape(usize, usize),
}

impl Yolov3Error {
  fn load(err: TractError) -> Self {
    Yolov3Error::ModelLoadError(format!("{err:?}"))
  }

  fn infer(err: TractError) -> Self {
    Yolov3Error::InferenceError(format!("{err:?}"))
  }
}

pub struct Yolov3Builder {
  model_path: String,
  labels_path: String,
  target_label: String,
  confidence_threshold: f32,
}

impl Yolov3Builder {
  pub fn new(model_path: impl Into<String>, labels_path: impl Into<String>) -> Self {
    Yolov3Builder {
      model_path: model_path.into(),
      labels_path: labels_path.into(),
      target_label: DEFAULT_TARGET_LABEL.to_string(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
  }

  pub fn target_label(mut self, label: impl Into<String>) -> Self {
    self.target_label = label.into();
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn build(self) -> Result<Yolov3, Yolov3Error> {
    info!("加载红绿灯检测模型: {}", self.model_path);

    let labels = LabelTable::from_file(&self.labels_path)?;
    let target_id = labels
      .id_of(&self.target_label)
      .ok_or_else(|| Yolov3Error::TargetMissing(self.target_label.clone()))?;
    debug!("目标类别 \"{}\" 的索引为 {}", self.target_label, target_id);

    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(Yolov3Error::load)?
      .with_input_fact(
        0,
        f32::fact([1, 3, YOLOV3_INPUT_H as usize, YOLOV3_INPUT_W as usize]).into(),
      )
      .map_err(Yolov3Error::load)?
      .into_optimized()
      .map_err(Yolov3Error::load)?
      .into_runnable()
      .map_err(Yolov3Error::load)?;

    info!("红绿灯检测模型加载完成");
    Ok(Yolov3 {
      plan,
      labels,
      target_id,
      target_label: self.target_label,
      confidence_threshold: self.confidence_threshold,
    })
  }
}

/// 传统单目标类检测器：网络输出为候选向量网格，由本适配器解码并过滤
pub struct Yolov3 {
  plan: OnnxPlan,
  labels: LabelTable,
  target_id: u32,
  target_label: String,
  confidence_threshold: f32,
}

impl Yolov3 {
  pub fn target_label(&self) -> &str {
    &self.target_label
  }

  /// 拉伸缩放到网络输入分辨率，像素缩放到 [0,1]，通道序为 NCHW
  fn preprocess(&self, image: &RgbImage) -> Tensor {
    let resized = image::imageops::resize(
      image,
      YOLOV3_INPUT_W,
      YOLOV3_INPUT_H,
      image::imageops::FilterType::Triangle,
    );
    let tensor: Tensor = tract_ndarray::Array4::from_shape_fn(
      (1, 3, YOLOV3_INPUT_H as usize, YOLOV3_INPUT_W as usize),
      |(_, c, y, x)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    )
    .into();
    tensor
  }
}

impl Model for Yolov3 {
  type Output = Vec<Candidate>;
  type Error = Yolov3Error;

  fn infer(&self, image: &RgbImage) -> Result<Self::Output, Self::Error> {
    debug!(
      "预处理: {}x{} -> {}x{}",
      image.width(),
      image.height(),
      YOLOV3_INPUT_W,
      YOLOV3_INPUT_H
    );
    let input = self.preprocess(image);

    debug!("执行前向推理");
    let outputs = self
      .plan
      .run(tvec!(input.into()))
      .map_err(Yolov3Error::infer)?;

    let row_len = YOLOV3_BOX_FIELDS + self.labels.len();
    let mut candidates = Vec::new();
    for output in outputs.iter() {
      let view = output.to_array_view::<f32>().map_err(Yolov3Error::infer)?;
      let flat: Vec<f32> = view.iter().copied().collect();
      candidates.extend(decode_output(
        &flat,
        row_len,
        self.target_id,
        self.confidence_threshold,
      )?);
    }

    debug!("解码得到 {} 个候选框", candidates.len());
    Ok(candidates)
  }
}

/// 解码一组输出单元，每个单元为 [cx, cy, w, h, objectness, 各类别分数…]。
/// 仅保留最高分类别为目标类且分数超过阈值的候选。
fn decode_output(
  data: &[f32],
  row_len: usize,
  target_id: u32,
  confidence_threshold: f32,
) -> Result<Vec<Candidate>, Yolov3Error> {
  if row_len == 0 || data.len() % row_len != 0 {
    return Err(Yolov3Error::OutputShape(data.len(), row_len));
  }

  let mut candidates = Vec::new();
  for row in data.chunks_exact(row_len) {
    let scores = &row[YOLOV3_BOX_FIELDS..];
    let (class_id, confidence) = argmax(scores);
    if confidence > confidence_threshold && class_id == target_id {
      candidates.push(Candidate {
        class_id,
        score: confidence,
        bbox: [row[0], row[1], row[2], row[3]],
      });
    }
  }
  Ok(candidates)
}

fn argmax(scores: &[f32]) -> (u32, f32) {
  let mut best = 0usize;
  let mut best_score = f32::MIN;
  for (idx, score) in scores.iter().enumerate() {
    if *score > best_score {
      best = idx;
      best_score = *score;
    }
  }
  (best as u32, best_score)
}

#[cfg(test)]
mod tests {
  use super::*;

  // 单元布局: [cx, cy, w, h, objectness, 类 0 分, 类 1 分, 类 2 分]
  fn row(bbox: [f32; 4], scores: [f32; 3]) -> Vec<f32> {
    let mut row = bbox.to_vec();
    row.push(1.0);
    row.extend_from_slice(&scores);
    row
  }

  #[test]
  fn keeps_only_confident_target_class() {
    let mut data = row([0.5, 0.5, 0.2, 0.2], [0.1, 0.9, 0.0]); // 目标类，高分
    data.extend(row([0.3, 0.3, 0.1, 0.1], [0.1, 0.4, 0.0])); // 目标类，低分
    data.extend(row([0.7, 0.7, 0.1, 0.1], [0.9, 0.1, 0.0])); // 非目标类，高分

    let candidates = decode_output(&data, 8, 1, 0.5).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].class_id, 1);
    assert!((candidates[0].score - 0.9).abs() < 1e-6);
    assert_eq!(candidates[0].bbox, [0.5, 0.5, 0.2, 0.2]);
  }

  #[test]
  fn threshold_is_strict() {
    // 分数恰好等于阈值时不保留
    let data = row([0.5, 0.5, 0.2, 0.2], [0.0, 0.5, 0.0]);
    let candidates = decode_output(&data, 8, 1, 0.5).unwrap();
    assert!(candidates.is_empty());
  }

  #[test]
  fn misaligned_output_is_an_error() {
    let data = vec![0.0; 13];
    assert!(matches!(
      decode_output(&data, 8, 1, 0.5),
      Err(Yolov3Error::OutputShape(13, 8))
    ));
  }

  #[test]
  fn empty_output_decodes_to_no_candidates() {
    let candidates = decode_output(&[], 8, 1, 0.5).unwrap();
    assert!(candidates.is_empty());
  }

  #[test]
  fn argmax_picks_first_on_tie() {
    let (class_id, score) = argmax(&[0.3, 0.7, 0.7]);
    assert_eq!(class_id, 1);
    assert!((score - 0.7).abs() < 1e-6);
  }
}
