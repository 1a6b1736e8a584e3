// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/item.rs - 餐盘物品记录
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

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::geometry::NormalizedBox;

/// 置信度缺省值
pub const DEFAULT_CONFIDENCE: f64 = 1.0;

/// 垃圾分类类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
  Trash,
  Recycling,
  Compost,
  DishReturn,
  #[default]
  Unknown,
}

impl Category {
  /// 解析类别字符串，无法识别时返回 `Unknown`。
  ///
  /// 忽略大小写与首尾空白，并接受 `dish return` 等写法。因此 `"Recycling"` 按
  /// recycling 计基础分 +50，而只做精确匹配时它会落入基础分 0。
  pub fn parse(raw: &str) -> Self {
    match raw.trim().to_lowercase().as_str() {
      "trash" => Category::Trash,
      "recycling" => Category::Recycling,
      "compost" => Category::Compost,
      "dish_return" | "dish return" | "dish-return" | "dishreturn" => Category::DishReturn,
      _ => Category::Unknown,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Category::Trash => "trash",
      Category::Recycling => "recycling",
      Category::Compost => "compost",
      Category::DishReturn => "dish_return",
      Category::Unknown => "unknown",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for Category {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

/// 餐盘上检测到的一个物品。
///
/// 只通过 [`Item::from_value`] 从预言机返回的 JSON 记录解码一次，
/// 字段缺失或格式错误时使用缺省值，不会失败。
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Item {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  pub category: Category,
  #[serde(rename = "box_2d", skip_serializing_if = "Option::is_none")]
  pub bbox: Option<NormalizedBox>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub material: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  clean: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  contaminated: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  confidence: Option<f64>,
}

impl Item {
  pub fn new(label: &str, category: Category) -> Self {
    Item {
      label: Some(label.to_string()),
      category,
      ..Default::default()
    }
  }

  pub fn with_bbox(mut self, bbox: NormalizedBox) -> Self {
    self.bbox = Some(bbox);
    self
  }

  pub fn with_material(mut self, material: &str) -> Self {
    self.material = Some(material.to_string());
    self
  }

  pub fn with_clean(mut self, clean: bool) -> Self {
    self.clean = Some(clean);
    self
  }

  pub fn with_contaminated(mut self, contaminated: bool) -> Self {
    self.contaminated = Some(contaminated);
    self
  }

  pub fn with_confidence(mut self, confidence: f64) -> Self {
    self.confidence = clamp_confidence(confidence);
    self
  }

  pub fn is_clean(&self) -> bool {
    self.clean.unwrap_or(false)
  }

  pub fn is_contaminated(&self) -> bool {
    self.contaminated.unwrap_or(false)
  }

  /// 置信度，总在 `[0, 1]` 之内
  pub fn confidence(&self) -> f64 {
    self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
  }

  /// 从单条 JSON 记录解码。非对象的记录得到全缺省值的物品。
  pub fn from_value(value: &Value) -> Self {
    let Some(record) = value.as_object() else {
      debug!("物品记录不是 JSON 对象，使用缺省值: {}", value);
      return Item::default();
    };

    let bbox = record.get("box_2d").and_then(NormalizedBox::from_value);
    if bbox.is_none() && record.contains_key("box_2d") {
      debug!("物品的 box_2d 格式错误，仅参与评分: {:?}", record.get("box_2d"));
    }

    Item {
      label: record.get("label").and_then(text_field),
      category: record
        .get("category")
        .and_then(Value::as_str)
        .map(Category::parse)
        .unwrap_or_default(),
      bbox,
      material: record.get("material").and_then(text_field),
      clean: bool_field(record, "clean"),
      contaminated: bool_field(record, "contaminated"),
      confidence: record
        .get("confidence")
        .and_then(number_field)
        .and_then(clamp_confidence),
    }
  }
}

/// 将规范化后的 JSON 数组解码为物品列表，非数组输入得到空列表
pub fn decode_items(value: &Value) -> Vec<Item> {
  match value.as_array() {
    Some(records) => records.iter().map(Item::from_value).collect(),
    None => Vec::new(),
  }
}

fn text_field(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn bool_field(record: &Map<String, Value>, key: &str) -> Option<bool> {
  match record.get(key)? {
    Value::Bool(b) => Some(*b),
    Value::String(s) => match s.trim().to_lowercase().as_str() {
      "true" | "yes" => Some(true),
      "false" | "no" => Some(false),
      _ => None,
    },
    _ => None,
  }
}

fn number_field(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

// 越界的置信度截断到 [0, 1]，非有限值视为缺失
fn clamp_confidence(confidence: f64) -> Option<f64> {
  confidence
    .is_finite()
    .then(|| confidence.clamp(0.0, 1.0))
}
