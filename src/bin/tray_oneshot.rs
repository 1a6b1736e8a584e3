// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/bin/tray_oneshot.rs - 单张餐盘图像分析
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_tray::{
  FromUrl,
  input::InputWrapper,
  oracle::OracleWrapper,
  output::{OutputWrapper, draw::Annotator},
  prompt::Mode,
  task::{OneShotTask, Task},
};
use tracing::info;

/// 单张图像分析参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///path/tray.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 预言机，例如 gemini://gemini-2.0-flash 或 replay:///path/response.txt
  #[arg(long, value_name = "ORACLE", default_value = "gemini://gemini-2.0-flash")]
  pub oracle: Url,
  /// 输出，例如 image:///path/out.jpg、report:///path/out.json
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 分析模式：detect 或 tray
  #[arg(long, default_value = "tray")]
  pub mode: Mode,
  /// 标签字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("预言机: {}", args.oracle);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let oracle = OracleWrapper::from_url(&args.oracle)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let annotator = Annotator::with_font(args.font.as_deref());

  let analysis = OneShotTask::new(args.mode, annotator).run_task(input.into_iter(), &oracle, &output)?;

  info!("检测到 {} 个物品", analysis.items.len());
  if let Some(scores) = analysis.item_scores() {
    for (item, score) in analysis.items.iter().zip(scores) {
      info!(
        "{} ({}): {}",
        item.label.as_deref().unwrap_or("Unknown"),
        item.category,
        score
      );
    }
  }
  if let Some(tray_score) = analysis.tray_score {
    info!("餐盘得分: {:.2}", tray_score);
  }

  Ok(())
}
