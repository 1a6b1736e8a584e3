// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/output/draw.rs - 物品检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{FontRef, FontVec, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::geometry::{PixelBox, to_pixels};
use crate::item::{Category, Item};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 14.0;
const LABEL_PADDING: i32 = 2;
const OUTLINE_WIDTH: i32 = 3;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

// 默认字体 (DejaVu Sans)
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

/// 首选字体名，在当前目录下查找
pub const PREFERRED_FONT: &str = "Arial.ttf";

/// 平台字体路径，按顺序尝试
pub const PLATFORM_FONTS: &[&str] = &[
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/Library/Fonts/Arial.ttf",
  "/usr/share/fonts/truetype/msttcorefonts/Arial.ttf",
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

/// 按序号着色时使用的调色板
pub const PALETTE: [Rgb<u8>; 20] = [
  Rgb([255, 0, 0]),     // red
  Rgb([0, 128, 0]),     // green
  Rgb([0, 0, 255]),     // blue
  Rgb([255, 255, 0]),   // yellow
  Rgb([255, 165, 0]),   // orange
  Rgb([255, 192, 203]), // pink
  Rgb([128, 0, 128]),   // purple
  Rgb([165, 42, 42]),   // brown
  Rgb([128, 128, 128]), // gray
  Rgb([0, 255, 255]),   // cyan
  Rgb([255, 0, 255]),   // magenta
  Rgb([0, 255, 0]),     // lime
  Rgb([0, 0, 128]),     // navy
  Rgb([0, 128, 128]),   // teal
  Rgb([128, 128, 0]),   // olive
  Rgb([255, 127, 80]),  // coral
  Rgb([230, 230, 250]), // lavender
  Rgb([238, 130, 238]), // violet
  Rgb([255, 215, 0]),   // gold
  Rgb([192, 192, 192]), // silver
];

/// 不在类别颜色表中的类别（包括 unknown）使用的颜色
pub const FALLBACK_CATEGORY_COLOR: Rgb<u8> = Rgb([128, 0, 128]); // purple

pub fn category_color(category: Category) -> Rgb<u8> {
  match category {
    Category::Trash => Rgb([255, 0, 0]),
    Category::Recycling => Rgb([0, 0, 255]),
    Category::Compost => Rgb([0, 128, 0]),
    Category::DishReturn => Rgb([255, 255, 0]),
    Category::Unknown => FALLBACK_CATEGORY_COLOR,
  }
}

/// 着色策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPolicy {
  /// 按物品在序列中的位置取调色板颜色
  ByIndex,
  /// 按垃圾分类类别取颜色，标签附带类别名
  ByCategory,
}

impl ColorPolicy {
  pub fn color(&self, index: usize, item: &Item) -> Rgb<u8> {
    match self {
      ColorPolicy::ByIndex => PALETTE[index % PALETTE.len()],
      ColorPolicy::ByCategory => category_color(item.category),
    }
  }

  pub fn label(&self, item: &Item) -> Option<String> {
    match self {
      ColorPolicy::ByIndex => item.label.clone(),
      ColorPolicy::ByCategory => Some(format!(
        "{} ({})",
        item.label.as_deref().unwrap_or("Unknown"),
        item.category
      )),
    }
  }
}

/// 标签字体：外部字体文件，或内嵌的默认字体
pub enum LabelFont {
  File { font: FontVec, path: PathBuf },
  Embedded(FontRef<'static>),
}

impl LabelFont {
  /// 依次尝试指定字体、首选字体、平台字体，最后使用内嵌字体
  pub fn resolve(preferred: Option<&Path>) -> Self {
    let candidates = preferred
      .map(Path::to_path_buf)
      .into_iter()
      .chain(std::iter::once(PathBuf::from(PREFERRED_FONT)))
      .chain(PLATFORM_FONTS.iter().map(PathBuf::from));

    for path in candidates {
      match Self::load(&path) {
        Some(font) => {
          debug!("使用标签字体: {}", path.display());
          return font;
        }
        None => debug!("字体不可用: {}", path.display()),
      }
    }

    warn!("未找到可用字体，使用内嵌字体");
    Self::embedded()
  }

  pub fn embedded() -> Self {
    let font = FontRef::try_from_slice(EMBEDDED_FONT).expect("无法加载嵌入的字体文件");
    LabelFont::Embedded(font)
  }

  fn load(path: &Path) -> Option<Self> {
    let data = std::fs::read(path).ok()?;
    let font = FontVec::try_from_vec(data).ok()?;
    Some(LabelFont::File {
      font,
      path: path.to_path_buf(),
    })
  }

  /// 字体文件路径，内嵌字体为 `None`
  pub fn path(&self) -> Option<&Path> {
    match self {
      LabelFont::File { path, .. } => Some(path),
      LabelFont::Embedded(_) => None,
    }
  }

  fn measure(&self, scale: PxScale, text: &str) -> (u32, u32) {
    match self {
      LabelFont::File { font, .. } => text_size(scale, font, text),
      LabelFont::Embedded(font) => text_size(scale, font, text),
    }
  }

  fn draw(&self, image: &mut RgbImage, x: i32, y: i32, scale: PxScale, text: &str) {
    match self {
      LabelFont::File { font, .. } => draw_text_mut(image, TEXT_COLOR, x, y, scale, font, text),
      LabelFont::Embedded(font) => draw_text_mut(image, TEXT_COLOR, x, y, scale, font, text),
    }
  }
}

/// 在图像副本上绘制物品边框和标签
pub struct Annotator {
  font: LabelFont,
  font_size: f32,
}

impl Default for Annotator {
  fn default() -> Self {
    Self::with_font(None)
  }
}

impl Annotator {
  pub fn with_font(preferred: Option<&Path>) -> Self {
    Self {
      font: LabelFont::resolve(preferred),
      font_size: LABEL_FONT_SIZE,
    }
  }

  /// 不查找字体文件，直接使用内嵌字体
  pub fn with_embedded_font() -> Self {
    Self {
      font: LabelFont::embedded(),
      font_size: LABEL_FONT_SIZE,
    }
  }

  pub fn font(&self) -> &LabelFont {
    &self.font
  }

  /// 返回绘制后的新图像，输入图像不变。没有有效边框的物品被跳过。
  pub fn annotate(&self, image: &RgbImage, items: &[Item], policy: ColorPolicy) -> RgbImage {
    let mut canvas = image.clone();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
      return canvas;
    }

    for (index, item) in items.iter().enumerate() {
      let Some(bbox) = item.bbox.as_ref() else {
        continue;
      };
      let pixels = to_pixels(bbox, width, height);
      let Some(pixels) = clip(pixels, width, height) else {
        debug!("物品 {} 的边框在图像之外，跳过", index);
        continue;
      };

      let color = policy.color(index, item);
      draw_outline(&mut canvas, &pixels, color);
      if let Some(label) = policy.label(item) {
        self.draw_label(&mut canvas, &pixels, &label, color);
      }
    }

    canvas
  }

  fn draw_label(&self, image: &mut RgbImage, bbox: &PixelBox, label: &str, color: Rgb<u8>) {
    if label.is_empty() {
      return;
    }
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = self.font.measure(scale, label);

    // 标签背景位于边框上方，不越过图像顶部
    let background_height = text_height + 2 * LABEL_PADDING as u32;
    let background_width = text_width + 2 * LABEL_PADDING as u32;
    let top = (bbox.y1 as i32 - background_height as i32).max(0);
    let left = bbox.x1 as i32;

    let rect = Rect::at(left, top).of_size(background_width, background_height);
    draw_filled_rect_mut(image, rect, color);
    self
      .font
      .draw(image, left + LABEL_PADDING, top + LABEL_PADDING, scale, label);
  }
}

// 裁剪到图像范围内，完全在图像外时返回 None
fn clip(bbox: PixelBox, width: u32, height: u32) -> Option<PixelBox> {
  let (max_x, max_y) = (width as i64 - 1, height as i64 - 1);
  if bbox.x2 < 0 || bbox.y2 < 0 || bbox.x1 > max_x || bbox.y1 > max_y {
    return None;
  }
  Some(PixelBox {
    x1: bbox.x1.clamp(0, max_x),
    y1: bbox.y1.clamp(0, max_y),
    x2: bbox.x2.clamp(0, max_x),
    y2: bbox.y2.clamp(0, max_y),
  })
}

// 边框向内加粗
fn draw_outline(image: &mut RgbImage, bbox: &PixelBox, color: Rgb<u8>) {
  for inset in 0..OUTLINE_WIDTH as i64 {
    let width = bbox.width() + 1 - 2 * inset;
    let height = bbox.height() + 1 - 2 * inset;
    if width <= 0 || height <= 0 {
      break;
    }
    let rect = Rect::at((bbox.x1 + inset) as i32, (bbox.y1 + inset) as i32)
      .of_size(width as u32, height as u32);
    draw_hollow_rect_mut(image, rect, color);
  }
}

/// 编码为指定格式的字节流
pub fn encode_image(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
  let mut bytes = Vec::new();
  image.write_to(&mut Cursor::new(&mut bytes), format)?;
  Ok(bytes)
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  encode_image(image, ImageFormat::Jpeg)
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  encode_image(image, ImageFormat::Png)
}
