// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/pipeline.rs - 单次请求的检测流水线
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

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::consolidate::consolidate;
use crate::ingest::{self, IngestError};
use crate::model::{Detection, Model, Yolov3, Yolov3Error, Yolov8, Yolov8Error};
use crate::output::{Draw, SaveError, content_type_for, persist};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Ingest(#[from] IngestError),
  #[error("红绿灯检测失败: {0}")]
  Light(#[from] Yolov3Error),
  #[error("交通标志检测失败: {0}")]
  Sign(#[from] Yolov8Error),
  #[error(transparent)]
  Save(#[from] SaveError),
}

/// 红绿灯路径的分析产物：标注后的图像字节直接作为响应体
pub struct LightAnalysis {
  pub image_bytes: Vec<u8>,
  pub content_type: &'static str,
  pub output_path: PathBuf,
}

/// 交通标志路径的分析产物：结构化检测记录加标注图的相对 URL
pub struct SignAnalysis {
  pub detections: Vec<SignRecord>,
  pub image_url: String,
  pub output_path: PathBuf,
}

/// 返回给调用方的单条检测记录，刻意不包含坐标
#[derive(Debug, Clone, Serialize)]
pub struct SignRecord {
  pub label: String,
  pub confidence: f32,
}

/// 解码 → 前向推理 → 阈值过滤与 NMS → 标注 → 落盘 → 返回图像字节
pub fn analyze_light(
  model: &Yolov3,
  draw: &Draw<'_>,
  output_dir: &Path,
  score_threshold: f32,
  iou_threshold: f32,
  bytes: &[u8],
  filename: &str,
) -> Result<LightAnalysis, PipelineError> {
  let mut image = ingest::decode_image(bytes)?;
  let (width, height) = image.dimensions();

  let start = std::time::Instant::now();
  let candidates = model.infer(&image)?;
  debug!("前向推理耗时: {:.2?}", start.elapsed());

  let kept = consolidate(&candidates, width, height, score_threshold, iou_threshold);
  let detections: Vec<Detection> = kept
    .iter()
    .map(|c| Detection {
      label: model.target_label().to_string(),
      score: c.score,
      bbox: c.pixel_rect(width, height),
    })
    .collect();
  info!(
    "红绿灯检测: {} 个候选, {} 个保留",
    candidates.len(),
    detections.len()
  );

  draw.annotate(&mut image, &detections);
  let output_path = persist(&image, filename, output_dir)?;
  let image_bytes = std::fs::read(&output_path).map_err(SaveError::from)?;

  Ok(LightAnalysis {
    image_bytes,
    content_type: content_type_for(filename),
    output_path,
  })
}

/// 扩展名校验 → 解码 → 前向推理（网络自带框合并） → 标注 → 落盘 → 返回记录与 URL
pub fn analyze_sign(
  model: &Yolov8,
  draw: &Draw<'_>,
  output_dir: &Path,
  bytes: &[u8],
  filename: &str,
) -> Result<SignAnalysis, PipelineError> {
  ingest::check_extension(filename)?;
  let mut image = ingest::decode_image(bytes)?;

  let start = std::time::Instant::now();
  let detections = model.infer(&image)?;
  debug!("前向推理耗时: {:.2?}", start.elapsed());
  info!("交通标志检测: {} 个目标", detections.len());

  let records = detections
    .iter()
    .map(|d| SignRecord {
      label: d.label.clone(),
      confidence: (d.score * 100.0).round() / 100.0,
    })
    .collect();

  draw.annotate(&mut image, &detections);
  let output_path = persist(&image, filename, output_dir)?;

  let name = output_path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  let image_url = format!("/output/{}", urlencoding::encode(&name));

  Ok(SignAnalysis {
    detections: records,
    image_url,
    output_path,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sign_path_checks_extension_before_decode() {
    // 字节内容完全不可解码，但扩展名校验必须先失败
    let err = ingest::check_extension("photo.bmp").unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat(_)));
  }

  #[test]
  fn sign_record_serializes_label_and_confidence_only() {
    let record = SignRecord {
      label: "stop".to_string(),
      confidence: 0.87,
    };
    let json = serde_json::to_value(&record).unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["label"], "stop");
    assert!((object["confidence"].as_f64().unwrap() - 0.87).abs() < 1e-3);
  }
}
