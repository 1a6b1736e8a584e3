// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/score.rs - 可回收评分与餐盘评分
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

use crate::item::{Category, Item};

// 评分常量
const RECYCLING_BASE: i32 = 50;
const TRASH_BASE: i32 = -30;
const CLEAN_BONUS: i32 = 10;
const CONTAMINATED_PENALTY: i32 = -30;
const CONFIDENCE_PIVOT: f64 = 0.5;
const CONFIDENCE_WEIGHT: f64 = 20.0;

pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

/// 材质加减分表，键为小写材质名
pub const MATERIAL_SCORES: &[(&str, i32)] = &[
  ("plastic", 10),
  ("metal", 10),
  ("glass", 10),
  ("paper", 10),
  ("styrofoam", -30),
  ("plastic+foil", -20),
];

fn category_base(category: Category) -> i32 {
  match category {
    Category::Recycling => RECYCLING_BASE,
    Category::Trash => TRASH_BASE,
    Category::Compost | Category::DishReturn | Category::Unknown => 0,
  }
}

fn material_score(material: Option<&str>) -> i32 {
  let Some(material) = material else {
    return 0;
  };
  let material = material.to_lowercase();
  MATERIAL_SCORES
    .iter()
    .find(|(name, _)| *name == material)
    .map(|(_, score)| *score)
    .unwrap_or(0)
}

// 截断取整（向零），0.49 得到 0 而不是 -1
fn confidence_adjustment(confidence: f64) -> i32 {
  ((confidence - CONFIDENCE_PIVOT) * CONFIDENCE_WEIGHT) as i32
}

/// 单个物品的可回收评分，取值 `[0, 100]`。
///
/// 中间结果允许越界，只在最后截断一次。
pub fn recyclability_score(item: &Item) -> u8 {
  let mut score = category_base(item.category);
  score += material_score(item.material.as_deref());
  if item.is_clean() {
    score += CLEAN_BONUS;
  }
  if item.is_contaminated() {
    score += CONTAMINATED_PENALTY;
  }
  score += confidence_adjustment(item.confidence());

  score.clamp(MIN_SCORE, MAX_SCORE) as u8
}

/// 餐盘评分：各物品评分的平均值，保留两位小数；空列表为 `0.0`
pub fn tray_score(items: &[Item]) -> f64 {
  if items.is_empty() {
    return 0.0;
  }
  let total: u32 = items.iter().map(|item| recyclability_score(item) as u32).sum();
  round2(total as f64 / items.len() as f64)
}

// 按二进制值的精确十进制展开保留两位小数，恰为一半时取偶数
fn round2(value: f64) -> f64 {
  let floor = (value * 100.0).floor();
  // fma 只舍入一次，差值的符号是精确的
  let diff = value.mul_add(100.0, -(floor + 0.5));
  let rounded = if diff > 0.0 || (diff == 0.0 && floor % 2.0 != 0.0) {
    floor + 1.0
  } else {
    floor
  };
  rounded / 100.0
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::NormalizedBox;
  use serde_json::json;

  #[test]
  fn clean_plastic_recycling_scores_eighty() {
    let item = Item::new("bottle", Category::Recycling)
      .with_material("plastic")
      .with_clean(true)
      .with_confidence(1.0);
    assert_eq!(recyclability_score(&item), 80);
  }

  #[test]
  fn contaminated_styrofoam_trash_clamps_to_zero() {
    let item = Item::new("cup", Category::Trash)
      .with_material("styrofoam")
      .with_contaminated(true)
      .with_confidence(0.5);
    assert_eq!(recyclability_score(&item), 0);
  }

  #[test]
  fn material_lookup_is_case_insensitive() {
    let upper = Item::new("can", Category::Recycling).with_material("METAL");
    let foil = Item::new("wrapper", Category::Recycling).with_material("Plastic+Foil");
    let odd = Item::new("thing", Category::Recycling).with_material("unobtainium");
    // 50 + 10 + 10(置信度缺省 1.0)
    assert_eq!(recyclability_score(&upper), 70);
    assert_eq!(recyclability_score(&foil), 40);
    assert_eq!(recyclability_score(&odd), 60);
  }

  #[test]
  fn confidence_truncates_toward_zero() {
    assert_eq!(confidence_adjustment(1.0), 10);
    assert_eq!(confidence_adjustment(0.5), 0);
    assert_eq!(confidence_adjustment(0.0), -10);
    assert_eq!(confidence_adjustment(0.49), 0);
    assert_eq!(confidence_adjustment(0.74), 4);
    assert_eq!(confidence_adjustment(0.26), -4);
  }

  #[test]
  fn malformed_records_stay_in_range() {
    for value in [
      json!({}),
      json!(null),
      json!({ "category": 7, "material": ["x"], "confidence": "high" }),
      json!({ "category": "recycling", "confidence": 1e9 }),
      json!({ "category": "trash", "confidence": -1e9, "contaminated": true }),
    ] {
      let score = recyclability_score(&Item::from_value(&value));
      assert!(score <= 100, "value {} scored {}", value, score);
    }
  }

  #[test]
  fn unknown_default_item_scores_ten() {
    // 0 + 0 + 10(置信度 1.0)
    assert_eq!(recyclability_score(&Item::default()), 10);
  }

  #[test]
  fn empty_tray_scores_zero() {
    assert_eq!(tray_score(&[]), 0.0);
  }

  #[test]
  fn tray_score_is_rounded_mean() {
    let items = vec![
      Item::new("bottle", Category::Recycling)
        .with_material("plastic")
        .with_clean(true),
      Item::new("napkin", Category::Compost),
      Item::new("cup", Category::Trash).with_material("styrofoam"),
    ];
    // (80 + 10 + 0) / 3 = 30.0
    assert_eq!(tray_score(&items), 30.0);

    let items = vec![
      Item::new("a", Category::Compost),
      Item::new("b", Category::Compost),
      Item::new("c", Category::Recycling),
    ];
    // (10 + 10 + 60) / 3 = 26.666...
    assert_eq!(tray_score(&items), 26.67);

    let expected = {
      let scores: Vec<f64> = items.iter().map(|i| recyclability_score(i) as f64).collect();
      round2(scores.iter().sum::<f64>() / scores.len() as f64)
    };
    assert_eq!(tray_score(&items), expected);
  }

  #[test]
  fn exact_half_cent_rounds_to_even() {
    // 71 = 50 + 10 + 10 + 1
    let high = Item::new("bottle", Category::Recycling)
      .with_material("plastic")
      .with_clean(true)
      .with_confidence(0.55);
    assert_eq!(recyclability_score(&high), 71);

    let mut items = vec![high, Item::default()];
    items.extend((0..6).map(|_| Item::new("cup", Category::Trash)));
    // 81 / 8 = 10.125
    assert_eq!(tray_score(&items), 10.12);

    items[2] = Item::default();
    // 91 / 8 = 11.375
    assert_eq!(tray_score(&items), 11.38);
  }

  #[test]
  fn round2_uses_binary_value() {
    assert_eq!(round2(0.125), 0.12);
    assert_eq!(round2(0.375), 0.38);
    // 2.675 实际略小于 2.675
    assert_eq!(round2(2.675), 2.67);
    // 0.025 实际略大于 0.025
    assert_eq!(round2(0.025), 0.03);
    assert_eq!(round2(80.0), 80.0);
    assert_eq!(round2(26.666666666666668), 26.67);
  }

  #[test]
  fn scoring_ignores_geometry() {
    let plain = Item::new("apple", Category::Compost);
    let boxed = plain.clone().with_bbox(NormalizedBox::new(1.0, 2.0, 3.0, 4.0));
    assert_eq!(recyclability_score(&plain), recyclability_score(&boxed));
  }
}
