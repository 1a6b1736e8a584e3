// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/oracle.rs - 视觉预言机定义
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::FromUrl;

/// 外部视觉预言机：输入图像与提示词，返回原始文本。
///
/// 单次同步调用，没有流式输出，也不重试。
pub trait VisionOracle {
  fn generate(&self, image: &RgbImage, prompt: &str, system: &str) -> Result<String, OracleError>;
}

#[cfg(feature = "gemini_oracle")]
mod gemini;
#[cfg(feature = "gemini_oracle")]
pub use self::gemini::{GeminiOracle, GeminiOracleBuilder};

mod replay;
pub use self::replay::ReplayOracle;

#[derive(Error, Debug)]
pub enum OracleError {
  #[error("无法连接预言机服务: {0}")]
  Connection(String),
  #[error("预言机请求超时 ({0}s)")]
  Timeout(u64),
  #[error("HTTP 客户端错误: {0}")]
  HttpClient(String),
  #[error("预言机返回错误状态 {status}: {body}")]
  Status { status: u16, body: String },
  #[error("预言机响应无法解析: {0}")]
  ResponseParsing(String),
  #[error("预言机没有返回任何文本")]
  EmptyResponse,
  #[error("缺少 API 密钥")]
  MissingApiKey,
  #[error("图像编码错误: {0}")]
  ImageEncode(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OracleWrapper {
  #[cfg(feature = "gemini_oracle")]
  Gemini(GeminiOracle),
  Replay(ReplayOracle),
}

impl FromUrl for OracleWrapper {
  type Error = OracleError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    match url.scheme() {
      #[cfg(feature = "gemini_oracle")]
      GeminiOracleBuilder::SCHEME => {
        let oracle = GeminiOracleBuilder::from_url(url)?.build()?;
        Ok(OracleWrapper::Gemini(oracle))
      }
      ReplayOracle::SCHEME => Ok(OracleWrapper::Replay(ReplayOracle::from_url(url)?)),
      other => Err(OracleError::SchemeMismatch(other.to_string())),
    }
  }
}

impl VisionOracle for OracleWrapper {
  fn generate(&self, image: &RgbImage, prompt: &str, system: &str) -> Result<String, OracleError> {
    match self {
      #[cfg(feature = "gemini_oracle")]
      OracleWrapper::Gemini(oracle) => oracle.generate(image, prompt, system),
      OracleWrapper::Replay(oracle) => oracle.generate(image, prompt, system),
    }
  }
}

/// 测试用预言机，返回固定文本或传输错误
#[cfg(test)]
pub struct MockOracle {
  response: Option<String>,
}

#[cfg(test)]
impl MockOracle {
  pub fn new(response: &str) -> Self {
    Self {
      response: Some(response.to_string()),
    }
  }

  pub fn failing() -> Self {
    Self { response: None }
  }
}

#[cfg(test)]
impl VisionOracle for MockOracle {
  fn generate(&self, _image: &RgbImage, _prompt: &str, _system: &str) -> Result<String, OracleError> {
    self
      .response
      .clone()
      .ok_or_else(|| OracleError::Connection("mock://offline".to_string()))
  }
}
