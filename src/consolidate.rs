// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/consolidate.rs - 候选框合并（贪心 NMS）
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

use tracing::debug;

use crate::model::Candidate;

/// 贪心非极大值抑制。
///
/// 1. 丢弃置信度不高于 score_threshold 的候选；
/// 2. 按置信度降序稳定排序（同分保持枚举顺序）；
/// 3. 反复取当前最高分候选，剔除与其同类且 IoU 超过 iou_threshold 的其余候选；
/// 4. 返回保留的候选，顺序即选取顺序。空输入返回空结果。
pub fn consolidate(
  candidates: &[Candidate],
  width: u32,
  height: u32,
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<Candidate> {
  let mut remaining: Vec<(Candidate, [f32; 4])> = candidates
    .iter()
    .filter(|c| c.score > score_threshold)
    .map(|c| (c.clone(), c.pixel_rect(width, height)))
    .collect();

  remaining.sort_by(|a, b| {
    b.0
      .score
      .partial_cmp(&a.0.score)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept = Vec::new();
  while !remaining.is_empty() {
    let (best, best_rect) = remaining.remove(0);
    remaining
      .retain(|(c, rect)| c.class_id != best.class_id || iou(&best_rect, rect) <= iou_threshold);
    kept.push(best);
  }

  debug!("NMS: {} 个候选 -> {} 个保留", candidates.len(), kept.len());
  kept
}

/// 两个像素空间 [x, y, w, h] 矩形的交并比。任一矩形面积为零时定义为 0。
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let area_a = a[2] * a[3];
  let area_b = b[2] * b[3];
  if area_a <= 0.0 || area_b <= 0.0 {
    return 0.0;
  }

  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = (a[0] + a[2]).min(b[0] + b[2]);
  let y2 = (a[1] + a[3]).min(b[1] + b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  intersection / (area_a + area_b - intersection)
}
