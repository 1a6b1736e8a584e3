// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/input/image_directory.rs - 图像目录输入
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{ImageFileInputError, TrayImage, read_image_file::load_tray_image},
};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageDirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{}: {source}", path.display())]
  ImageError {
    path: PathBuf,
    source: ImageFileInputError,
  },
}

/// 目录中的所有图像文件，按文件名排序，逐张惰性解码。`folder:///path/to/dir`
pub struct ImageDirectoryInput {
  files: Vec<PathBuf>,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageDirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageDirectoryInputError::SchemeMismatch);
    }
    Self::from_dir(crate::url_path(url))
  }
}

impl ImageDirectoryInput {
  pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ImageDirectoryInputError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
      let path = entry?.path();
      if path.is_file() && is_image_file(&path) {
        files.push(path);
      }
    }
    files.sort();
    info!("目录 {} 中找到 {} 张图像", dir.as_ref().display(), files.len());
    Ok(Self { files })
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    .unwrap_or(false)
}

impl IntoIterator for ImageDirectoryInput {
  type Item = Result<TrayImage, ImageDirectoryInputError>;
  type IntoIter = ImageDirectoryIter;

  fn into_iter(self) -> Self::IntoIter {
    ImageDirectoryIter {
      files: self.files.into_iter(),
    }
  }
}

pub struct ImageDirectoryIter {
  files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ImageDirectoryIter {
  type Item = Result<TrayImage, ImageDirectoryInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    Some(
      load_tray_image(&path).map_err(|source| ImageDirectoryInputError::ImageError { path, source }),
    )
  }
}
