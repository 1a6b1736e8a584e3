// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/geometry.rs - 归一化坐标到像素坐标的映射
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

use serde::{Serialize, Serializer};
use serde_json::Value;

/// 归一化坐标的量程
pub const NORMALIZED_SCALE: f64 = 1000.0;

/// 预言机给出的边框，`[y1, x1, y2, x2]`，取值 0-1000，顺序不保证
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
  pub y1: f64,
  pub x1: f64,
  pub y2: f64,
  pub x2: f64,
}

impl NormalizedBox {
  pub fn new(y1: f64, x1: f64, y2: f64, x2: f64) -> Self {
    Self { y1, x1, y2, x2 }
  }

  /// 从 `box_2d` 字段解码，必须恰好是 4 个数字
  pub fn from_value(value: &Value) -> Option<Self> {
    let coords = value.as_array()?;
    if coords.len() != 4 {
      return None;
    }
    let mut v = [0.0f64; 4];
    for (slot, coord) in v.iter_mut().zip(coords) {
      *slot = coord.as_f64()?;
    }
    Some(Self::new(v[0], v[1], v[2], v[3]))
  }
}

impl Serialize for NormalizedBox {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    [self.y1, self.x1, self.y2, self.x2].serialize(serializer)
  }
}

/// 像素坐标边框，保证 `x1 <= x2` 且 `y1 <= y2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
  pub x1: i64,
  pub y1: i64,
  pub x2: i64,
  pub y2: i64,
}

impl PixelBox {
  pub fn width(&self) -> i64 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> i64 {
    self.y2 - self.y1
  }
}

/// 将归一化边框映射到给定尺寸的图像上。
///
/// x 坐标乘以宽度，y 坐标乘以高度，再截断为整数；
/// 若映射后顺序颠倒，则分别交换 x 与 y。这里不裁剪到图像范围内。
pub fn to_pixels(bbox: &NormalizedBox, width: u32, height: u32) -> PixelBox {
  let scale = |v: f64, dim: u32| (v / NORMALIZED_SCALE * dim as f64) as i64;

  let mut x1 = scale(bbox.x1, width);
  let mut y1 = scale(bbox.y1, height);
  let mut x2 = scale(bbox.x2, width);
  let mut y2 = scale(bbox.y2, height);

  if x1 > x2 {
    std::mem::swap(&mut x1, &mut x2);
  }
  if y1 > y2 {
    std::mem::swap(&mut y1, &mut y2);
  }

  PixelBox { x1, y1, x2, y2 }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn maps_axes_to_their_dimension() {
    let bbox = NormalizedBox::new(100.0, 200.0, 300.0, 400.0);
    let px = to_pixels(&bbox, 640, 480);
    assert_eq!(px, PixelBox { x1: 128, y1: 48, x2: 256, y2: 144 });
  }

  #[test]
  fn truncates_instead_of_rounding() {
    let bbox = NormalizedBox::new(0.0, 999.0, 1000.0, 1000.0);
    let px = to_pixels(&bbox, 3, 3);
    // 999 / 1000 * 3 = 2.997
    assert_eq!(px.x1, 2);
    assert_eq!(px.x2, 3);
  }

  #[test]
  fn swaps_reversed_coordinates_independently() {
    let bbox = NormalizedBox::new(800.0, 100.0, 200.0, 900.0);
    let px = to_pixels(&bbox, 1000, 1000);
    assert_eq!(px, PixelBox { x1: 100, y1: 200, x2: 900, y2: 800 });

    let bbox = NormalizedBox::new(100.0, 900.0, 800.0, 100.0);
    let px = to_pixels(&bbox, 1000, 1000);
    assert_eq!(px, PixelBox { x1: 100, y1: 100, x2: 900, y2: 800 });
  }

  #[test]
  fn always_well_ordered() {
    let coords = [-50.0, 0.0, 1.0, 333.3, 500.0, 999.9, 1000.0, 1500.0];
    for &a in &coords {
      for &b in &coords {
        for (w, h) in [(1, 1), (17, 9), (1920, 1080)] {
          let px = to_pixels(&NormalizedBox::new(a, b, b, a), w, h);
          assert!(px.x1 <= px.x2 && px.y1 <= px.y2);
          assert!(px.width() >= 0 && px.height() >= 0);
        }
      }
    }
  }

  #[test]
  fn decodes_only_four_numbers() {
    assert_eq!(
      NormalizedBox::from_value(&json!([1, 2.5, 3, 4])),
      Some(NormalizedBox::new(1.0, 2.5, 3.0, 4.0))
    );
    assert_eq!(NormalizedBox::from_value(&json!([1, 2, 3])), None);
    assert_eq!(NormalizedBox::from_value(&json!([1, 2, 3, "4"])), None);
    assert_eq!(NormalizedBox::from_value(&json!({ "y1": 1 })), None);
  }
}
