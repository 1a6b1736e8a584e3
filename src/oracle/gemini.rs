// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/oracle/gemini.rs - Gemini 视觉预言机
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

use std::borrow::Cow;
use std::time::Duration;

use base64::Engine as _;
use image::{RgbImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  oracle::{OracleError, VisionOracle},
  output::draw::encode_jpeg,
};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

const API_KEY_HEADER: &str = "x-goog-api-key";
const TEMPERATURE: f32 = 0.5;
// 上传前图像的最大边长
const MAX_UPLOAD_SIDE: u32 = 1024;

pub struct GeminiOracleBuilder {
  model: String,
  base_url: String,
  api_key: Option<String>,
  timeout_secs: u64,
}

impl FromUrlWithScheme for GeminiOracleBuilder {
  const SCHEME: &'static str = "gemini";
}

impl FromUrl for GeminiOracleBuilder {
  type Error = OracleError;

  /// `gemini://<model>?timeout=<secs>`，密钥与服务地址来自环境变量
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OracleError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let model = url
      .host_str()
      .filter(|host| !host.is_empty())
      .unwrap_or_else(|| url.path().trim_matches('/'));
    let model = if model.is_empty() { DEFAULT_MODEL } else { model };

    let timeout_secs = url
      .query_pairs()
      .find(|(k, _)| k == "timeout")
      .and_then(|(_, v)| v.parse().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Ok(GeminiOracleBuilder {
      model: model.to_string(),
      base_url: std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
      api_key: std::env::var(API_KEY_ENV).ok(),
      timeout_secs,
    })
  }
}

impl GeminiOracleBuilder {
  pub fn new(model: &str) -> Self {
    GeminiOracleBuilder {
      model: model.to_string(),
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: None,
      timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
  }

  pub fn api_key(mut self, api_key: Option<String>) -> Self {
    if api_key.is_some() {
      self.api_key = api_key;
    }
    self
  }

  pub fn base_url(mut self, base_url: &str) -> Self {
    self.base_url = base_url.to_string();
    self
  }

  pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
    self.timeout_secs = timeout_secs;
    self
  }

  pub fn build(self) -> Result<GeminiOracle, OracleError> {
    let api_key = self
      .api_key
      .filter(|key| !key.trim().is_empty())
      .ok_or(OracleError::MissingApiKey)?;

    let client = reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(self.timeout_secs))
      .build()
      .map_err(|e| OracleError::HttpClient(e.to_string()))?;

    info!("Gemini 预言机: 模型 {}, 超时 {}s", self.model, self.timeout_secs);

    Ok(GeminiOracle {
      model: self.model,
      base_url: self.base_url.trim_end_matches('/').to_string(),
      api_key,
      timeout_secs: self.timeout_secs,
      client,
    })
  }
}

/// Gemini `generateContent` 的阻塞客户端
pub struct GeminiOracle {
  model: String,
  base_url: String,
  api_key: String,
  timeout_secs: u64,
  client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  system_instruction: Content<'a>,
  contents: Vec<Content<'a>>,
  #[serde(rename = "generationConfig")]
  generation_config: GenerationConfig,
  #[serde(rename = "safetySettings")]
  safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
  parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
  Text { text: &'a str },
  InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
  mime_type: &'static str,
  data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
  temperature: f32,
}

#[derive(Serialize)]
struct SafetySetting {
  category: &'static str,
  threshold: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
  text: Option<String>,
}

impl GeminiOracle {
  pub fn model(&self) -> &str {
    &self.model
  }

  // 密钥只放在请求头中，不出现在 URL 里
  fn request<T: Serialize>(&self, body: &T) -> reqwest::blocking::RequestBuilder {
    self
      .client
      .post(self.endpoint())
      .header(API_KEY_HEADER, &self.api_key)
      .json(body)
  }

  fn endpoint(&self) -> String {
    format!(
      "{}/v1beta/models/{}:generateContent",
      self.base_url, self.model
    )
  }
}

impl VisionOracle for GeminiOracle {
  fn generate(&self, image: &RgbImage, prompt: &str, system: &str) -> Result<String, OracleError> {
    let upload = fit_for_upload(image);
    let jpeg = encode_jpeg(&upload)?;
    debug!(
      "上传图像 {}x{}, {:.1} KB",
      upload.width(),
      upload.height(),
      jpeg.len() as f64 / 1024.0
    );

    let body = GenerateRequest {
      system_instruction: Content {
        parts: vec![Part::Text { text: system }],
      },
      contents: vec![Content {
        parts: vec![
          Part::Text { text: prompt },
          Part::InlineData {
            inline_data: InlineData {
              mime_type: "image/jpeg",
              data: base64::engine::general_purpose::STANDARD.encode(&jpeg),
            },
          },
        ],
      }],
      generation_config: GenerationConfig {
        temperature: TEMPERATURE,
      },
      safety_settings: vec![SafetySetting {
        category: "HARM_CATEGORY_DANGEROUS_CONTENT",
        threshold: "BLOCK_ONLY_HIGH",
      }],
    };

    let response = self
      .request(&body)
      .send()
      .map_err(|e| {
        error!("Gemini 请求失败: {}", e);
        if e.is_connect() {
          OracleError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
          OracleError::Timeout(self.timeout_secs)
        } else {
          OracleError::HttpClient(e.to_string())
        }
      })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().unwrap_or_default();
      return Err(OracleError::Status {
        status: status.as_u16(),
        body,
      });
    }

    let parsed: GenerateResponse = response
      .json()
      .map_err(|e| OracleError::ResponseParsing(e.to_string()))?;

    response_text(parsed)
  }
}

fn response_text(response: GenerateResponse) -> Result<String, OracleError> {
  let text: String = response
    .candidates
    .into_iter()
    .next()
    .and_then(|candidate| candidate.content)
    .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
    .unwrap_or_default();

  if text.is_empty() {
    return Err(OracleError::EmptyResponse);
  }
  Ok(text)
}

/// 等比缩放到最大边不超过 `max_side`，不放大
pub fn thumbnail_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
  let longest = width.max(height);
  if longest <= max_side {
    return (width, height);
  }
  let ratio = max_side as f64 / longest as f64;
  let scale = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
  (scale(width), scale(height))
}

fn fit_for_upload(image: &RgbImage) -> Cow<'_, RgbImage> {
  let (width, height) = image.dimensions();
  let (w, h) = thumbnail_dimensions(width, height, MAX_UPLOAD_SIDE);
  if (w, h) == (width, height) {
    return Cow::Borrowed(image);
  }
  Cow::Owned(image::imageops::resize(image, w, h, FilterType::Lanczos3))
}
