// 该文件是 Shanan Tray（山南餐盘）项目的一部分。
// src/oracle/replay.rs - 回放已保存的预言机响应
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
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  oracle::{OracleError, VisionOracle},
};

/// 忽略图像，总是返回文件中保存的响应文本
pub struct ReplayOracle {
  response: String,
}

impl ReplayOracle {
  pub fn new(response: impl Into<String>) -> Self {
    Self {
      response: response.into(),
    }
  }
}

impl FromUrlWithScheme for ReplayOracle {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayOracle {
  type Error = OracleError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(OracleError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = crate::url_path(url);
    info!("回放预言机响应: {}", path);
    let response = std::fs::read_to_string(&path)?;
    Ok(Self::new(response))
  }
}

impl VisionOracle for ReplayOracle {
  fn generate(&self, _image: &RgbImage, _prompt: &str, _system: &str) -> Result<String, OracleError> {
    Ok(self.response.clone())
  }
}
