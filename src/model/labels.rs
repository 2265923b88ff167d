// 该文件是 Guanlu （观路识途） 项目的一部分。
// src/model/labels.rs - 类别索引表
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

use std::path::Path;

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("读取类别文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别文件为空")]
  Empty,
}

/// 类别索引表，文件格式为每行一个类别名
#[derive(Debug, Clone)]
pub struct LabelTable {
  names: Vec<String>,
}

impl LabelTable {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let names: Vec<String> = text
      .lines()
      .map(|line| line.trim().to_string())
      .filter(|line| !line.is_empty())
      .collect();

    if names.is_empty() {
      return Err(LabelError::Empty);
    }

    info!(
      "类别表加载完成: {} ({} 个类别)",
      path.as_ref().display(),
      names.len()
    );
    Ok(LabelTable { names })
  }

  pub fn from_names(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
    LabelTable {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  pub fn name(&self, class_id: u32) -> &str {
    self
      .names
      .get(class_id as usize)
      .map(String::as_str)
      .unwrap_or("unknown")
  }

  /// 按类别名查找索引
  pub fn id_of(&self, name: &str) -> Option<u32> {
    self.names.iter().position(|n| n == name).map(|i| i as u32)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_and_fallback() {
    let table = LabelTable::from_names(["person", "bicycle", "traffic light"]);
    assert_eq!(table.name(2), "traffic light");
    assert_eq!(table.name(42), "unknown");
    assert_eq!(table.id_of("traffic light"), Some(2));
    assert_eq!(table.id_of("zeppelin"), None);
  }

  #[test]
  fn from_file_skips_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("names.txt");
    std::fs::write(&path, "stop\n\n  yield  \nspeed limit\n").unwrap();

    let table = LabelTable::from_file(&path).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.name(1), "yield");
  }

  #[test]
  fn empty_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("names.txt");
    std::fs::write(&path, "\n\n").unwrap();
    assert!(matches!(LabelTable::from_file(&path), Err(LabelError::Empty)));
  }
}
