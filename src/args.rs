// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;

/// Guanlu 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 红绿灯检测模型（YOLOv3 ONNX）文件路径
  #[arg(long, default_value = "models/yolov3.onnx", value_name = "FILE")]
  pub light_model: String,

  /// 红绿灯检测模型的类别文件路径（每行一个类别名）
  #[arg(long, default_value = "models/coco.names", value_name = "FILE")]
  pub light_labels: String,

  /// 交通标志检测模型（YOLOv8 ONNX）文件路径
  #[arg(long, default_value = "models/signs.onnx", value_name = "FILE")]
  pub sign_model: String,

  /// 交通标志检测模型的类别文件路径
  #[arg(long, default_value = "models/signs.names", value_name = "FILE")]
  pub sign_labels: String,

  /// HTTP 监听地址
  #[arg(long, default_value = "0.0.0.0:8000", value_name = "ADDR")]
  pub listen: String,

  /// 标注图像输出目录，同时以 /output 前缀对外只读提供
  #[arg(long, default_value = "output", value_name = "DIR")]
  pub output_dir: String,

  /// 红绿灯路径的置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 交通标志路径的显示阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub sign_confidence: f32,
}
