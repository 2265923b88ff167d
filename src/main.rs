// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use guanlu::api::{self, AppState};
use guanlu::args::Args;
use guanlu::model::{Yolov3Builder, Yolov8Builder};
use guanlu::output::Draw;

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("Guanlu 交通要素检测服务");
  info!("红绿灯模型: {}", args.light_model);
  info!("交通标志模型: {}", args.sign_model);
  info!("输出目录: {}", args.output_dir);
  info!(
    "置信度阈值: {}, NMS 阈值: {}",
    args.confidence, args.nms_threshold
  );

  // 模型加载失败属于启动期致命错误，不会进入请求路径
  let light = Yolov3Builder::new(&args.light_model, &args.light_labels)
    .confidence_threshold(args.confidence)
    .build()
    .context("加载红绿灯检测模型失败")?;
  let sign = Yolov8Builder::new(&args.sign_model, &args.sign_labels)
    .confidence_threshold(args.sign_confidence)
    .build()
    .context("加载交通标志检测模型失败")?;

  let state = Arc::new(AppState {
    light,
    sign,
    draw: Draw::default(),
    output_dir: args.output_dir.into(),
    score_threshold: args.confidence,
    iou_threshold: args.nms_threshold,
  });

  let app = api::router(state);
  let listener = tokio::net::TcpListener::bind(&args.listen)
    .await
    .with_context(|| format!("无法监听 {}", args.listen))?;
  info!("服务已启动: http://{}", args.listen);
  axum::serve(listener, app)
    .await
    .context("HTTP 服务异常退出")?;

  Ok(())
}
