// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/model.rs - 模型
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

pub mod labels;
mod yolov3;
mod yolov8;

pub use self::yolov3::{Yolov3, Yolov3Builder, Yolov3Error};
pub use self::yolov8::{Yolov8, Yolov8Builder, Yolov8Error};

/// 检测模型：一次前向推理，输入为原始尺寸的 RGB 图像
pub trait Model {
  type Output;
  type Error;

  fn infer(&self, image: &RgbImage) -> Result<Self::Output, Self::Error>;
}

/// 网络输出空间的候选框
#[derive(Debug, Clone)]
pub struct Candidate {
  pub class_id: u32,
  pub score: f32,
  pub bbox: [f32; 4], // [cx, cy, w, h]，均为图像宽高的比例
}

impl Candidate {
  /// 反归一化为像素坐标的 [x, y, w, h]（左上角 + 宽高），逐步截断取整
  pub fn pixel_rect(&self, width: u32, height: u32) -> [f32; 4] {
    let cx = (self.bbox[0] * width as f32).trunc();
    let cy = (self.bbox[1] * height as f32).trunc();
    let w = (self.bbox[2] * width as f32).trunc();
    let h = (self.bbox[3] * height as f32).trunc();
    [(cx - w / 2.0).trunc(), (cy - h / 2.0).trunc(), w, h]
  }
}

/// 最终检测结果
#[derive(Debug, Clone)]
pub struct Detection {
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x, y, w, h]，像素坐标
}
