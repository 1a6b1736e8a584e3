// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/output/report.rs - JSON 分析报告
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

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, input::TrayImage, item::Item, output::Render, prompt::Mode,
  task::Analysis,
};

#[derive(Error, Debug)]
pub enum ReportOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct ReportItem<'a> {
  #[serde(flatten)]
  pub item: &'a Item,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub score: Option<u8>,
}

/// 一张图像的分析报告
#[derive(Debug, Serialize)]
pub struct Report<'a> {
  pub source: &'a str,
  pub mode: &'static str,
  pub items: Vec<ReportItem<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tray_score: Option<f64>,
  pub analyzed_at: DateTime<Utc>,
}

impl<'a> Report<'a> {
  pub fn new(source: &'a str, analysis: &'a Analysis) -> Self {
    let scores = analysis.item_scores();
    let items = analysis
      .items
      .iter()
      .enumerate()
      .map(|(i, item)| ReportItem {
        item,
        score: scores.as_ref().map(|s| s[i]),
      })
      .collect();

    Report {
      source,
      mode: match analysis.mode {
        Mode::Detect => "detect",
        Mode::Tray => "tray",
      },
      items,
      tray_score: analysis.tray_score,
      analyzed_at: analysis.analyzed_at,
    }
  }

  pub fn write_to(&self, path: &Path) -> Result<(), ReportOutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
    info!("保存报告到文件: {}", path.display());
    Ok(())
  }
}

/// 保存 JSON 报告，`report:///path/out.json`，`{name}` 替换为输入名称
pub struct ReportOutput {
  path: String,
}

impl FromUrlWithScheme for ReportOutput {
  const SCHEME: &'static str = "report";
}

impl FromUrl for ReportOutput {
  type Error = ReportOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(ReportOutputError::SchemeMismatch);
    }
    Ok(ReportOutput {
      path: crate::url_path(uri),
    })
  }
}

impl Render<TrayImage, Analysis> for ReportOutput {
  type Error = ReportOutputError;

  fn render_result(&self, frame: &TrayImage, result: &Analysis) -> Result<(), Self::Error> {
    let path = PathBuf::from(self.path.replace("{name}", &frame.name));
    Report::new(&frame.name, result).write_to(&path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::draw::Annotator;
  use crate::task::analyze_response;
  use image::RgbImage;
  use serde_json::{Value, json};

  const RESPONSE: &str = r#"[
    {"label":"bottle","category":"recycling","material":"plastic","clean":true,"box_2d":[0,0,10,10]},
    {"label":"napkin","category":"compost"}
  ]"#;

  #[test]
  fn tray_report_contains_items_and_scores() {
    let image = RgbImage::new(10, 10);
    let analysis = analyze_response(&image, RESPONSE, Mode::Tray, &Annotator::with_embedded_font());
    let value = serde_json::to_value(Report::new("lunch", &analysis)).unwrap();

    assert_eq!(value["source"], "lunch");
    assert_eq!(value["mode"], "tray");
    assert_eq!(value["tray_score"], json!(45.0));
    assert_eq!(
      value["items"][0],
      json!({
        "label": "bottle",
        "category": "recycling",
        "box_2d": [0.0, 0.0, 10.0, 10.0],
        "material": "plastic",
        "clean": true,
        "score": 80
      })
    );
    assert_eq!(value["items"][1]["score"], 10);
    assert!(value["items"][1].get("box_2d").is_none());
  }

  #[test]
  fn detect_report_has_no_scores() {
    let image = RgbImage::new(10, 10);
    let analysis = analyze_response(&image, RESPONSE, Mode::Detect, &Annotator::with_embedded_font());
    let value = serde_json::to_value(Report::new("x", &analysis)).unwrap();
    assert!(value.get("tray_score").is_none());
    assert!(value["items"][0].get("score").is_none());
  }

  #[test]
  fn writes_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("report://{}/{{name}}.json", dir.path().display())).unwrap();
    let output = ReportOutput::from_url(&url).unwrap();
    let tray = TrayImage {
      name: "lunch".to_string(),
      image: RgbImage::new(4, 4),
    };
    let analysis = analyze_response(&tray.image, "garbage", Mode::Tray, &Annotator::with_embedded_font());
    output.render_result(&tray, &analysis).unwrap();

    let text = std::fs::read_to_string(dir.path().join("lunch.json")).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["items"], json!([]));
    assert_eq!(value["tray_score"], json!(0.0));
  }
}
