// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/prompt.rs - 预言机提示词
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

use std::str::FromStr;

use crate::output::draw::ColorPolicy;

/// 预言机的系统指令
pub const SYSTEM_INSTRUCTION: &str = "\
Return bounding boxes as a JSON array with labels. Never return masks or code fencing. Limit to 25 objects.
If an object is present multiple times, name them according to their unique characteristic (colors, size, position, unique characteristics, etc..).
";

pub const DETECT_PROMPT: &str = "Identify all objects in this image";

pub const TRAY_PROMPT: &str = "\
Analyze this lunch tray image. Identify all food items, containers, and utensils.
For each item, determine which disposal category it belongs to:
- Trash (non-recyclable items)
- Recycling (plastic, metal, glass containers, apple sauce, Plastic utensils)
- Compost (food waste, napkins, paper products)
- Dish Return (reusable trays, plates, silverware, glass products)

Return the results as a JSON array with these fields:
- label: name of the item
- category: disposal category (trash, recycling, compost, dish_return)
- box_2d: bounding box coordinates [y1, x1, y2, x2] in normalized 0-1000 range
";

/// 分析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
  /// 通用目标检测，按序号着色，不评分
  Detect,
  /// 餐盘分析，按类别着色并评分
  #[default]
  Tray,
}

impl Mode {
  pub fn prompt(&self) -> &'static str {
    match self {
      Mode::Detect => DETECT_PROMPT,
      Mode::Tray => TRAY_PROMPT,
    }
  }

  pub fn color_policy(&self) -> ColorPolicy {
    match self {
      Mode::Detect => ColorPolicy::ByIndex,
      Mode::Tray => ColorPolicy::ByCategory,
    }
  }

  pub fn is_scored(&self) -> bool {
    matches!(self, Mode::Tray)
  }
}

impl FromStr for Mode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "detect" => Ok(Mode::Detect),
      "tray" => Ok(Mode::Tray),
      other => Err(format!("未知的分析模式: {}", other)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn system_instruction_forbids_fences_and_masks() {
    assert!(SYSTEM_INSTRUCTION.contains("Never return masks or code fencing"));
    assert!(SYSTEM_INSTRUCTION.contains("Limit to 25 objects"));
  }

  #[test]
  fn tray_prompt_requests_all_fields() {
    for field in ["label", "category", "box_2d", "dish_return"] {
      assert!(TRAY_PROMPT.contains(field));
    }
    assert!(!DETECT_PROMPT.contains("category"));
  }

  #[test]
  fn mode_parsing() {
    assert_eq!("Tray".parse::<Mode>(), Ok(Mode::Tray));
    assert_eq!("detect".parse::<Mode>(), Ok(Mode::Detect));
    assert!("segment".parse::<Mode>().is_err());
    assert_eq!(Mode::Detect.color_policy(), ColorPolicy::ByIndex);
    assert!(Mode::Tray.is_scored());
  }
}
