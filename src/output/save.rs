// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/output/save.rs - 标注图像落盘
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

use image::RgbImage;
use thiserror::Error;
use tracing::info;

const FALLBACK_FILENAME: &str = "upload.jpg";

#[derive(Error, Debug)]
pub enum SaveError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 以上传时的文件名（仅取 basename）保存标注图，同名文件直接覆盖
pub fn persist(
  image: &RgbImage,
  original_filename: &str,
  output_dir: &Path,
) -> Result<PathBuf, SaveError> {
  std::fs::create_dir_all(output_dir)?;

  let name = Path::new(original_filename)
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
  let path = output_dir.join(name);

  image.save(&path)?;
  info!("保存标注图像: {}", path.display());
  Ok(path)
}

/// 根据文件扩展名推断响应的 Content-Type
pub fn content_type_for(filename: &str) -> &'static str {
  let ext = Path::new(filename)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase());
  match ext.as_deref() {
    Some("png") => "image/png",
    _ => "image/jpeg",
  }
}
