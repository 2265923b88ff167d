// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/api.rs - HTTP 服务边界
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

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, State},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
  routing::post,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::error;

use crate::ingest::IngestError;
use crate::model::{Yolov3, Yolov8};
use crate::output::Draw;
use crate::pipeline::{self, PipelineError};

/// 上传图像的体积上限
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
const UPLOAD_FIELD: &str = "file";

/// 进程级共享状态：模型句柄只读，启动时构建一次，经 Arc 注入各请求
pub struct AppState {
  pub light: Yolov3,
  pub sign: Yolov8,
  pub draw: Draw<'static>,
  pub output_dir: PathBuf,
  pub score_threshold: f32,
  pub iou_threshold: f32,
}

pub fn router(state: Arc<AppState>) -> Router {
  // 输出目录以只读静态文件形式对外提供，image_url 由此可解析
  let serve_output = ServeDir::new(&state.output_dir);

  Router::new()
    .route("/analyze/light", post(analyze_light))
    .route("/analyze/sign", post(analyze_sign))
    .nest_service("/output", serve_output)
    .layer(CorsLayer::permissive())
    .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
    .with_state(state)
}

/// 两个端点共用的错误边界，一律转换为 {"error": …} 形式的 JSON 响应
#[derive(Debug)]
pub enum ApiError {
  MissingFile,
  Upload(String),
  Pipeline(PipelineError),
  TaskFailed,
}

impl From<PipelineError> for ApiError {
  fn from(err: PipelineError) -> Self {
    ApiError::Pipeline(err)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::MissingFile => (
        StatusCode::BAD_REQUEST,
        format!("请求中缺少 {UPLOAD_FIELD} 字段"),
      ),
      ApiError::Upload(message) => (StatusCode::BAD_REQUEST, message),
      ApiError::Pipeline(err) => {
        let status = match &err {
          PipelineError::Ingest(IngestError::UnsupportedFormat(_)) => {
            StatusCode::UNSUPPORTED_MEDIA_TYPE
          }
          PipelineError::Ingest(IngestError::DecodeError(_)) => StatusCode::BAD_REQUEST,
          _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, err.to_string())
      }
      ApiError::TaskFailed => (
        StatusCode::INTERNAL_SERVER_ERROR,
        "推理任务异常终止".to_string(),
      ),
    };

    error!("请求失败 ({}): {}", status, message);
    (status, Json(json!({ "error": message }))).into_response()
  }
}

/// 读取 multipart 表单中名为 file 的上传字段，返回字节与原始文件名
async fn read_upload(multipart: &mut Multipart) -> Result<(Vec<u8>, String), ApiError> {
  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| ApiError::Upload(format!("解析 multipart 失败: {e}")))?
  {
    if field.name() == Some(UPLOAD_FIELD) {
      let filename = field.file_name().unwrap_or("upload.jpg").to_string();
      let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::Upload(format!("读取上传内容失败: {e}")))?;
      return Ok((bytes.to_vec(), filename));
    }
  }
  Err(ApiError::MissingFile)
}

async fn analyze_light(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Response, ApiError> {
  let (bytes, filename) = read_upload(&mut multipart).await?;

  // 前向推理为阻塞计算，移出异步执行器
  let outcome = tokio::task::spawn_blocking(move || {
    pipeline::analyze_light(
      &state.light,
      &state.draw,
      &state.output_dir,
      state.score_threshold,
      state.iou_threshold,
      &bytes,
      &filename,
    )
  })
  .await
  .map_err(|_| ApiError::TaskFailed)??;

  Ok(
    (
      StatusCode::OK,
      [(header::CONTENT_TYPE, outcome.content_type)],
      outcome.image_bytes,
    )
      .into_response(),
  )
}

async fn analyze_sign(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
  let (bytes, filename) = read_upload(&mut multipart).await?;

  let outcome = tokio::task::spawn_blocking(move || {
    pipeline::analyze_sign(&state.sign, &state.draw, &state.output_dir, &bytes, &filename)
  })
  .await
  .map_err(|_| ApiError::TaskFailed)??;

  Ok(Json(json!({
    "detections": outcome.detections,
    "image_url": outcome.image_url,
  })))
}
