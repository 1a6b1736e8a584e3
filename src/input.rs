// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/input.rs - 餐盘图像输入
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
use thiserror::Error;

use crate::FromUrl;

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

mod image_directory;
pub use self::image_directory::{ImageDirectoryInput, ImageDirectoryInputError, ImageDirectoryIter};

/// 一张已解码的餐盘图像
#[derive(Debug, Clone)]
pub struct TrayImage {
  /// 来源名称（文件名主干），用于输出命名
  pub name: String,
  pub image: RgbImage,
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Image directory input error: {0}")]
  ImageDirectoryInputError(#[from] ImageDirectoryInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ImageDirectory(ImageDirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == ImageFileInput::SCHEME {
      let input = ImageFileInput::from_url(url)?;
      return Ok(InputWrapper::ReadImageFile(input));
    }
    if url.scheme() == ImageDirectoryInput::SCHEME {
      let input = ImageDirectoryInput::from_url(url)?;
      return Ok(InputWrapper::ImageDirectory(input));
    }
    Err(InputError::SchemeMismatch)
  }
}

impl IntoIterator for InputWrapper {
  type Item = Result<TrayImage, InputError>;
  type IntoIter = InputWrapperIter;

  fn into_iter(self) -> Self::IntoIter {
    match self {
      InputWrapper::ReadImageFile(input) => InputWrapperIter::ReadImageFile(input.into_iter()),
      InputWrapper::ImageDirectory(input) => InputWrapperIter::ImageDirectory(input.into_iter()),
    }
  }
}

pub enum InputWrapperIter {
  ReadImageFile(std::option::IntoIter<TrayImage>),
  ImageDirectory(ImageDirectoryIter),
}

impl Iterator for InputWrapperIter {
  type Item = Result<TrayImage, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapperIter::ReadImageFile(input) => input.next().map(Ok),
      InputWrapperIter::ImageDirectory(input) => input.next().map(|r| r.map_err(InputError::from)),
    }
  }
}
