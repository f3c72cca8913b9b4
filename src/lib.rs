// 该文件是 Shanan （山南西风） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod annotation;
pub mod config;
pub mod detector;
pub mod frame;
pub mod input;
pub mod merge;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod sampler;
pub mod task;
pub mod timeunit;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 取出 URL 中的路径部分，并还原百分号编码（例如路径中的空格）
pub(crate) fn decoded_path(url: &url::Url) -> String {
  let path = url.path();
  urlencoding::decode(path)
    .map(|p| p.into_owned())
    .unwrap_or_else(|_| path.to_string())
}

/// 读取 URL 查询参数
pub(crate) fn query_value(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}
