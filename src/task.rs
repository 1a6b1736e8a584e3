// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/task.rs - 餐盘分析任务
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

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use image::RgbImage;
use tracing::{error, info, warn};

use crate::{
  input::TrayImage,
  item::{Item, decode_items},
  normalize::normalize_value,
  oracle::{OracleError, VisionOracle},
  output::{Render, draw::Annotator},
  prompt::{Mode, SYSTEM_INSTRUCTION},
  score::{recyclability_score, tray_score},
};

/// 一张图像的分析结果
#[derive(Debug, Clone)]
pub struct Analysis {
  pub mode: Mode,
  pub items: Vec<Item>,
  pub annotated: RgbImage,
  /// 仅餐盘模式下有值
  pub tray_score: Option<f64>,
  pub analyzed_at: DateTime<Utc>,
}

impl Analysis {
  /// 各物品评分，与 `items` 一一对应
  pub fn item_scores(&self) -> Option<Vec<u8>> {
    self
      .mode
      .is_scored()
      .then(|| self.items.iter().map(recyclability_score).collect())
  }

  pub fn annotated_jpeg(&self) -> Result<Vec<u8>, image::ImageError> {
    crate::output::draw::encode_jpeg(&self.annotated)
  }
}

/// 分析一张图像：调用预言机，规范化响应，再分别绘制与评分。
///
/// 只有预言机调用失败会返回错误；响应格式问题只会让结果变少。
pub fn analyze<O: VisionOracle + ?Sized>(
  image: &RgbImage,
  oracle: &O,
  mode: Mode,
  annotator: &Annotator,
) -> Result<Analysis, OracleError> {
  let raw = oracle.generate(image, mode.prompt(), SYSTEM_INSTRUCTION)?;
  Ok(analyze_response(image, &raw, mode, annotator))
}

/// 对已有的预言机响应文本做分析
pub fn analyze_response(image: &RgbImage, raw: &str, mode: Mode, annotator: &Annotator) -> Analysis {
  let items = decode_items(&normalize_value(raw));
  let boxed = items.iter().filter(|item| item.bbox.is_some()).count();
  info!("解析出 {} 个物品，其中 {} 个带边框", items.len(), boxed);

  let annotated = annotator.annotate(image, &items, mode.color_policy());
  let tray_score = mode.is_scored().then(|| tray_score(&items));

  Analysis {
    mode,
    items,
    annotated,
    tray_score,
    analyzed_at: Utc::now(),
  }
}

pub trait Task<I, O, R>: Sized {
  type Error;
  type Output;
  fn run_task(self, input: I, oracle: &O, output: &R) -> Result<Self::Output, Self::Error>;
}

/// 只处理输入中的第一张图像
pub struct OneShotTask {
  mode: Mode,
  annotator: Annotator,
}

impl OneShotTask {
  pub fn new(mode: Mode, annotator: Annotator) -> Self {
    Self { mode, annotator }
  }
}

impl<IE, RE, I, O, R> Task<I, O, R> for OneShotTask
where
  IE: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<TrayImage, IE>>,
  O: VisionOracle,
  R: Render<TrayImage, Analysis, Error = RE>,
{
  type Error = anyhow::Error;
  type Output = Analysis;

  fn run_task(self, mut input: I, oracle: &O, output: &R) -> Result<Analysis, Self::Error> {
    info!("开始任务...");
    let tray = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))??;
    info!("输入图像 {} 获取成功，开始分析...", tray.name);

    let now = std::time::Instant::now();
    let analysis = analyze(&tray.image, oracle, self.mode, &self.annotator)?;
    info!("分析完成，耗时: {:.2?}", now.elapsed());

    output.render_result(&tray, &analysis)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(analysis)
  }
}

/// 批量任务的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
  pub processed: usize,
  pub failed: usize,
}

/// 每张图像在工作线程上独立处理，单张失败不影响其他图像
pub struct BatchTask {
  mode: Mode,
  annotator: Annotator,
  workers: usize,
}

impl BatchTask {
  pub fn new(mode: Mode, annotator: Annotator) -> Self {
    Self {
      mode,
      annotator,
      workers: 1,
    }
  }

  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }
}

impl<IE, RE, I, O, R> Task<I, O, R> for BatchTask
where
  IE: std::error::Error + Send + Sync + 'static,
  RE: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<TrayImage, IE>> + Send,
  O: VisionOracle + Sync,
  R: Render<TrayImage, Analysis, Error = RE> + Sync,
{
  type Error = anyhow::Error;
  type Output = BatchSummary;

  fn run_task(self, input: I, oracle: &O, output: &R) -> Result<BatchSummary, Self::Error> {
    info!("开始批量任务，工作线程数: {}", self.workers);
    let queue = Mutex::new(input);
    let processed = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    thread::scope(|scope| {
      for worker in 0..self.workers {
        let queue = &queue;
        let processed = &processed;
        let failed = &failed;
        let this = &self;
        scope.spawn(move || {
          loop {
            let next = queue.lock().unwrap_or_else(|e| e.into_inner()).next();
            let Some(next) = next else {
              break;
            };
            let index = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Err(e) = this.process(next, oracle, output) {
              failed.fetch_add(1, Ordering::SeqCst);
              error!("[worker {}] 第 {} 张图像处理失败: {:#}", worker, index, e);
            }
          }
        });
      }
    });

    let summary = BatchSummary {
      processed: processed.into_inner(),
      failed: failed.into_inner(),
    };
    if summary.failed > 0 {
      warn!("批量任务完成，{} / {} 张失败", summary.failed, summary.processed);
    } else {
      info!("批量任务完成，共 {} 张", summary.processed);
    }
    Ok(summary)
  }
}

impl BatchTask {
  fn process<IE, RE, O, R>(
    &self,
    next: Result<TrayImage, IE>,
    oracle: &O,
    output: &R,
  ) -> anyhow::Result<()>
  where
    IE: std::error::Error + Send + Sync + 'static,
    RE: std::error::Error + Send + Sync + 'static,
    O: VisionOracle,
    R: Render<TrayImage, Analysis, Error = RE>,
  {
    let tray = next?;
    let analysis = analyze(&tray.image, oracle, self.mode, &self.annotator)?;
    match analysis.tray_score {
      Some(score) => info!("{}: {} 个物品，餐盘评分 {:.2}", tray.name, analysis.items.len(), score),
      None => info!("{}: {} 个物品", tray.name, analysis.items.len()),
    }
    output.render_result(&tray, &analysis)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::item::Category;
  use crate::oracle::MockOracle;
  use image::Rgb;
  use std::convert::Infallible;

  const TRAY_RESPONSE: &str = "Here you go:\n```json\n[{\"label\":\"apple\",\"category\":\"compost\",\"box_2d\":[100,200,300,400]}]\n```";

  /// 记录渲染次数，可配置为失败
  #[derive(Default)]
  struct CountingOutput {
    rendered: Mutex<Vec<String>>,
  }

  impl Render<TrayImage, Analysis> for CountingOutput {
    type Error = std::io::Error;

    fn render_result(&self, source: &TrayImage, _analysis: &Analysis) -> Result<(), Self::Error> {
      if source.name.starts_with("fail") {
        return Err(std::io::Error::other("render failed"));
      }
      self.rendered.lock().unwrap().push(source.name.clone());
      Ok(())
    }
  }

  fn tray(name: &str) -> TrayImage {
    TrayImage {
      name: name.to_string(),
      image: RgbImage::from_pixel(200, 100, Rgb([0, 0, 0])),
    }
  }

  #[test]
  fn fenced_tray_response_scores_one_compost_item() {
    let image = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
    let oracle = MockOracle::new(TRAY_RESPONSE);
    let analysis = analyze(&image, &oracle, Mode::Tray, &Annotator::with_embedded_font()).unwrap();

    assert_eq!(analysis.items.len(), 1);
    assert_eq!(analysis.items[0].category, Category::Compost);
    // compost 0 + 置信度 10
    assert_eq!(analysis.tray_score, Some(10.0));
    assert_eq!(analysis.item_scores(), Some(vec![10]));
    // 边框 x: 40..=80, y: 10..=30，compost 为绿色
    assert_eq!(*analysis.annotated.get_pixel(40, 20), Rgb([0, 128, 0]));
    assert_ne!(analysis.annotated, image);
  }

  #[test]
  fn empty_response_scores_zero_and_keeps_image() {
    let image = RgbImage::from_pixel(32, 32, Rgb([9, 9, 9]));
    let analysis = analyze_response(&image, "no items here", Mode::Tray, &Annotator::with_embedded_font());
    assert!(analysis.items.is_empty());
    assert_eq!(analysis.tray_score, Some(0.0));
    assert_eq!(analysis.annotated, image);
  }

  #[test]
  fn detect_mode_is_not_scored() {
    let image = RgbImage::new(10, 10);
    let analysis = analyze_response(
      &image,
      r#"[{"label":"cup","box_2d":[0,0,500,500]}]"#,
      Mode::Detect,
      &Annotator::with_embedded_font(),
    );
    assert_eq!(analysis.tray_score, None);
    assert_eq!(analysis.item_scores(), None);
  }

  #[test]
  fn oracle_failure_is_fatal_for_request() {
    let image = RgbImage::new(10, 10);
    let result = analyze(
      &image,
      &MockOracle::failing(),
      Mode::Tray,
      &Annotator::with_embedded_font(),
    );
    assert!(matches!(result, Err(OracleError::Connection(_))));
  }

  #[test]
  fn one_shot_renders_first_image() {
    let output = CountingOutput::default();
    let input = vec![Ok::<_, Infallible>(tray("first")), Ok(tray("second"))].into_iter();
    let analysis = OneShotTask::new(Mode::Tray, Annotator::with_embedded_font())
      .run_task(input, &MockOracle::new(TRAY_RESPONSE), &output)
      .unwrap();
    assert_eq!(analysis.items.len(), 1);
    assert_eq!(*output.rendered.lock().unwrap(), vec!["first".to_string()]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let output = CountingOutput::default();
    let input = Vec::<Result<TrayImage, Infallible>>::new().into_iter();
    let result = OneShotTask::new(Mode::Tray, Annotator::with_embedded_font()).run_task(
      input,
      &MockOracle::new("[]"),
      &output,
    );
    assert!(result.is_err());
  }

  #[test]
  fn batch_isolates_failures() {
    let output = CountingOutput::default();
    let input = vec![
      Ok(tray("a")),
      Err(std::io::Error::other("unreadable")),
      Ok(tray("fail-render")),
      Ok(tray("b")),
      Ok(tray("c")),
    ]
    .into_iter();

    let summary = BatchTask::new(Mode::Tray, Annotator::with_embedded_font())
      .with_workers(3)
      .run_task(input, &MockOracle::new(TRAY_RESPONSE), &output)
      .unwrap();

    assert_eq!(summary, BatchSummary { processed: 5, failed: 2 });
    let mut rendered = output.rendered.lock().unwrap().clone();
    rendered.sort();
    assert_eq!(rendered, vec!["a", "b", "c"]);
  }

  #[test]
  fn batch_with_failing_oracle_counts_every_image() {
    let output = CountingOutput::default();
    let input = vec![Ok::<_, Infallible>(tray("a")), Ok(tray("b"))].into_iter();
    let summary = BatchTask::new(Mode::Detect, Annotator::with_embedded_font())
      .with_workers(0)
      .run_task(input, &MockOracle::failing(), &output)
      .unwrap();
    assert_eq!(summary, BatchSummary { processed: 2, failed: 2 });
    assert!(output.rendered.lock().unwrap().is_empty());
  }
}
