// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/bin/tray_batch.rs - 批量餐盘图像分析
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
  task::{BatchTask, Task},
};
use tracing::{info, warn};

/// 批量分析参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入目录，例如 folder:///path/trays
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 预言机，例如 gemini://gemini-2.0-flash
  #[arg(long, value_name = "ORACLE", default_value = "gemini://gemini-2.0-flash")]
  pub oracle: Url,
  /// 输出，例如 folder:///path/records 或 image:///path/{name}.jpg
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 分析模式：detect 或 tray
  #[arg(long, default_value = "tray")]
  pub mode: Mode,
  /// 标签字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 并发工作线程数
  #[arg(long, default_value = "2", env = "TRAY_WORKERS")]
  pub workers: usize,
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

  let summary = BatchTask::new(args.mode, annotator)
    .with_workers(args.workers)
    .run_task(input.into_iter(), &oracle, &output)?;

  info!("处理 {} 张图像", summary.processed);
  if summary.failed > 0 {
    warn!("{} 张图像处理失败", summary.failed);
  }

  Ok(())
}
