// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/normalize.rs - 预言机响应规范化
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

//! 把预言机返回的任意文本变成一个合法的 JSON 数组。
//!
//! 解析策略按顺序尝试，第一个成功者胜出；全部失败时返回空数组。
//! 这里不校验数组元素的形状，逐字段的缺省处理在 [`crate::item`] 中完成。

use std::borrow::Cow;

use serde_json::Value;
use tracing::{debug, warn};

pub const EMPTY_ARRAY: &str = "[]";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// 一个解析策略：成功时必须返回 JSON 数组
pub type Strategy = fn(&str) -> Option<Value>;

/// 按优先级排列的解析策略
pub const STRATEGIES: &[(&str, Strategy)] = &[
  ("fenced_block", fenced_block),
  ("bracket_span", bracket_span),
];

/// 规范化为 JSON 数组文本，总能被解析为数组
pub fn normalize(raw: &str) -> String {
  serde_json::to_string(&normalize_value(raw)).unwrap_or_else(|_| EMPTY_ARRAY.to_string())
}

/// 规范化为 JSON 数组值
pub fn normalize_value(raw: &str) -> Value {
  STRATEGIES
    .iter()
    .find_map(|(name, strategy)| {
      let value = strategy(raw)?;
      debug!("响应解析策略 {} 成功", name);
      Some(value)
    })
    .unwrap_or_else(|| {
      warn!("无法从响应中解析出 JSON 数组，使用空数组");
      Value::Array(Vec::new())
    })
}

/// 去掉 ```` ```json ```` 代码块围栏后直接解析；没有围栏时直接解析全文
pub fn fenced_block(raw: &str) -> Option<Value> {
  parse_array(&strip_fence(raw))
}

/// 截取第一个 `[` 到最后一个 `]` 之间的内容解析
pub fn bracket_span(raw: &str) -> Option<Value> {
  let stripped = strip_fence(raw);
  span_of(&stripped)
    .and_then(parse_array)
    .or_else(|| span_of(raw).and_then(parse_array))
}

fn span_of(text: &str) -> Option<&str> {
  let start = text.find('[')?;
  let end = text.rfind(']')?;
  (end > start).then(|| &text[start..=end])
}

fn strip_fence(raw: &str) -> Cow<'_, str> {
  let lines: Vec<&str> = raw.lines().collect();
  let Some(open) = lines
    .iter()
    .position(|line| line.trim().eq_ignore_ascii_case(JSON_FENCE))
  else {
    return Cow::Borrowed(raw);
  };

  let rest = lines[open + 1..].join("\n");
  match rest.find(FENCE) {
    Some(close) => Cow::Owned(rest[..close].to_string()),
    None => Cow::Owned(rest),
  }
}

fn parse_array(text: &str) -> Option<Value> {
  serde_json::from_str::<Value>(text)
    .ok()
    .filter(Value::is_array)
}
