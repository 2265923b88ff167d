// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/ingest.rs - 上传图像解码与格式校验
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

use std::io::Cursor;
use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

/// 交通标志路径允许的上传扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum IngestError {
  #[error("不支持的图像格式: \"{0}\"，仅支持 jpg / jpeg / png")]
  UnsupportedFormat(String),
  #[error("图像解码失败: {0}")]
  DecodeError(image::ImageError),
}

impl From<image::ImageError> for IngestError {
  fn from(err: image::ImageError) -> Self {
    IngestError::DecodeError(err)
  }
}

/// 按文件扩展名校验上传格式，在任何解码尝试之前调用
pub fn check_extension(filename: &str) -> Result<(), IngestError> {
  let ext = Path::new(filename)
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .unwrap_or_default();

  if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
    Ok(())
  } else {
    Err(IngestError::UnsupportedFormat(ext))
  }
}

/// 将上传字节解码为 RGB 图像
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, IngestError> {
  let image = ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()
    .map_err(|e| IngestError::DecodeError(image::ImageError::IoError(e)))?
    .decode()?;
  debug!("图像解码完成: {}x{}", image.width(), image.height());
  Ok(image.into())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
      .write_to(&mut bytes, image::ImageFormat::Png)
      .unwrap();
    bytes.into_inner()
  }

  #[test]
  fn extension_allow_list() {
    assert!(check_extension("photo.jpg").is_ok());
    assert!(check_extension("photo.JPEG").is_ok());
    assert!(check_extension("photo.png").is_ok());
  }

  #[test]
  fn bmp_extension_rejected_before_decode() {
    let err = check_extension("photo.bmp").unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat(ext) if ext == "bmp"));
  }

  #[test]
  fn missing_extension_rejected() {
    assert!(matches!(
      check_extension("photo"),
      Err(IngestError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn decode_valid_png() {
    let image = decode_image(&png_bytes(8, 6)).unwrap();
    assert_eq!(image.dimensions(), (8, 6));
  }

  #[test]
  fn decode_corrupt_bytes_fails() {
    let err = decode_image(&[0x12, 0x34, 0x56, 0x78]).unwrap_err();
    assert!(matches!(err, IngestError::DecodeError(_)));
  }

  #[test]
  fn decode_empty_bytes_fails() {
    assert!(matches!(
      decode_image(&[]),
      Err(IngestError::DecodeError(_))
    ));
  }
}
