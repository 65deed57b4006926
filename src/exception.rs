// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了代理服务器在请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了协议解析错误、输入校验错误以及上游（元数据 API / CDN）错误。
//! - **语义分层**：下层组件只返回带类型的 `Exception`，不关心 HTTP 状态码；
//!   状态码的选择只发生在 `proxy` 模块的 `ProxyFacade` 中。
//! - **用户友好**：通过 `thiserror` 派生 `Display`，错误信息可以直接写入日志。

use thiserror::Error;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 请求行缺失或格式不正确。
    #[error("Malformed request line")]
    MalformedRequest,
    /// 客户端使用了服务器不支持的 HTTP 方法。
    #[error("Unsupported request method")]
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
    /// 标识符为空、文件名不符合格式等输入错误。
    #[error("{0}")]
    InvalidInput(String),
    /// 文件名不在本次解析得到的文件名集合中。
    #[error("Filename not found in chapter data: {0}")]
    FilenameNotFound(String),
    /// 网络错误、超时，或元数据层返回了非成功状态。
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    /// 上游明确返回了非 2xx 状态码。
    #[error("Upstream returned HTTP {0}")]
    UpstreamStatus(u16),
    /// 上游响应缺少 baseUrl、hash 或页面文件名。
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    /// 配置文件无法读取或解析。
    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Exception {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Exception::UpstreamStatus(status.as_u16());
        }
        if e.is_timeout() {
            Exception::UpstreamUnavailable(format!("request timed out: {}", e))
        } else if e.is_connect() {
            Exception::UpstreamUnavailable(format!("connection failed: {}", e))
        } else {
            Exception::UpstreamUnavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Exception::FilenameNotFound("p1.png".to_string()).to_string(),
            "Filename not found in chapter data: p1.png"
        );
        assert_eq!(
            Exception::UpstreamStatus(404).to_string(),
            "Upstream returned HTTP 404"
        );
        assert_eq!(
            Exception::InvalidInput("Missing filename".to_string()).to_string(),
            "Missing filename"
        );
    }
}
