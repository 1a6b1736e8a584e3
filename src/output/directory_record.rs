// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/output/directory_record.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::TrayImage,
  output::{
    Render,
    report::{Report, ReportOutputError},
    save_image_file::{SaveImageFileError, save_image},
  },
  task::Analysis,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] SaveImageFileError),
  #[error("报告错误: {0}")]
  ReportError(#[from] ReportOutputError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 保存哪一张图像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordImage {
  Annotated,
  Raw,
}

/// 按日期分目录保存图像与报告，`folder:///dir?record=raw&format=png&always`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  image: RecordImage,
  extension: String,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let image = match uri.query_pairs().find(|(k, _)| k == "record") {
      Some((_, v)) if v == "raw" => RecordImage::Raw,
      _ => RecordImage::Annotated,
    };
    let extension = uri
      .query_pairs()
      .find(|(k, _)| k == "format")
      .map(|(_, v)| v.to_lowercase())
      .unwrap_or_else(|| "jpg".to_string());
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(crate::url_path(uri)),
      image,
      extension,
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
  }

  // 返回目录与不含扩展名的文件名
  fn frame_path(
    &self,
    now: DateTime<Utc>,
    name: &str,
  ) -> Result<(PathBuf, String), DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    let stem = format!("{}-{:04X}-{}", now.format("%H-%M-%S"), self.frame_id(), name);
    Ok((directory, stem))
  }
}

impl Render<TrayImage, Analysis> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &TrayImage, result: &Analysis) -> Result<(), Self::Error> {
    if !self.always && result.items.is_empty() {
      info!("{} 没有检测到物品，不保存", frame.name);
      return Ok(());
    }

    let (directory, stem) = self.frame_path(result.analyzed_at, &frame.name)?;
    let image = match self.image {
      RecordImage::Annotated => &result.annotated,
      RecordImage::Raw => &frame.image,
    };
    save_image(&directory.join(format!("{}.{}", stem, self.extension)), image)?;
    Report::new(&frame.name, result).write_to(&directory.join(format!("{}.json", stem)))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::draw::Annotator;
  use crate::prompt::Mode;
  use crate::task::analyze_response;
  use image::RgbImage;

  fn files_under(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
      let path = entry.unwrap().path();
      if path.is_dir() {
        found.extend(files_under(&path));
      } else {
        found.push(path);
      }
    }
    found.sort();
    found
  }

  fn tray() -> TrayImage {
    TrayImage {
      name: "lunch".to_string(),
      image: RgbImage::new(16, 16),
    }
  }

  #[test]
  fn records_image_and_report_by_date() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?format=png", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let tray = tray();
    let analysis = analyze_response(
      &tray.image,
      r#"[{"label":"cup","category":"trash","box_2d":[0,0,500,500]}]"#,
      Mode::Tray,
      &Annotator::with_embedded_font(),
    );
    output.render_result(&tray, &analysis).unwrap();

    let files = files_under(dir.path());
    assert_eq!(files.len(), 2);
    let day = analysis.analyzed_at;
    let expected_dir = dir
      .path()
      .join(day.year().to_string())
      .join(format!("{:02}", day.month()))
      .join(format!("{:02}", day.day()));
    assert!(files.iter().all(|f| f.parent() == Some(expected_dir.as_path())));
    assert!(files[0].to_string_lossy().ends_with("-0001-lunch.json"));
    assert!(files[1].to_string_lossy().ends_with("-0001-lunch.png"));
  }

  #[test]
  fn empty_analysis_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let tray = tray();
    let analysis = analyze_response(&tray.image, "[]", Mode::Tray, &Annotator::with_embedded_font());

    let url = url::Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    DirectoryRecordOutput::from_url(&url)
      .unwrap()
      .render_result(&tray, &analysis)
      .unwrap();
    assert!(files_under(dir.path()).is_empty());

    let url = url::Url::parse(&format!("folder://{}?always&record=raw", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.image, RecordImage::Raw);
    output.render_result(&tray, &analysis).unwrap();
    assert_eq!(files_under(dir.path()).len(), 2);
  }
}
