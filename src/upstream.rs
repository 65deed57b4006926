// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 上游 HTTP 客户端模块
//!
//! - `Transport`：出站 GET 的最小抽象，便于在测试中替换为假的上游。
//! - `HttpTransport`：基于 `reqwest` 的实现，所有请求共享一个连接池。
//! - `UpstreamClient`：负责请求 at-home 元数据接口。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL, USER_AGENT};

use crate::{config::Config, exception::Exception};

/// 出站 GET 请求。
///
/// 实现必须满足：超时或连接失败返回 `UpstreamUnavailable`，
/// 非 2xx 返回 `UpstreamStatus(code)`，响应体读取不完整时返回错误而不是截断的数据。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: HeaderMap, timeout: Duration)
        -> Result<Bytes, Exception>;
}

/// 基于 `reqwest` 的出站传输层
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, use_system_proxy: bool) -> Result<Self, Exception> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10));
        if !use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| Exception::Config(format!("无法创建HTTP客户端: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, Exception> {
        Self::new(config.connect_timeout(), config.use_system_proxy())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Result<Bytes, Exception> {
        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(Exception::from)?;

        let status = response.status();
        if !status.is_success() {
            debug!("上游{}返回HTTP {}", url, status.as_u16());
            return Err(Exception::UpstreamStatus(status.as_u16()));
        }

        // 读取不完整时 reqwest 会返回错误，这里直接向上传播
        let body = response.bytes().await.map_err(|e| {
            Exception::UpstreamUnavailable(format!("读取响应体失败: {}", e))
        })?;
        Ok(body)
    }
}

/// at-home 元数据接口的客户端
pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    api_base_url: String,
    user_agent: String,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        api_base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            timeout,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(
            transport,
            config.api_base_url(),
            config.user_agent(),
            config.metadata_timeout(),
        )
    }

    /// at-home 元数据接口的 URL
    pub fn metadata_url(&self, chapter_id: &str) -> String {
        format!("{}/at-home/server/{}", self.api_base_url, chapter_id)
    }

    /// 请求章节的 at-home 元数据，返回原始响应体。
    ///
    /// 只发起一次请求，不重试。上游明确返回 404 时保留为 `UpstreamStatus(404)`，
    /// 其余非成功状态都视为元数据层不可用。
    pub async fn fetch_metadata(&self, chapter_id: &str) -> Result<String, Exception> {
        let url = self.metadata_url(chapter_id);
        debug!("请求at-home元数据: {}", url);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Ok(ua) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, ua);
        }

        let body = match self.transport.get(&url, headers, self.timeout).await {
            Ok(body) => body,
            Err(Exception::UpstreamStatus(404)) => {
                warn!("at-home服务报告章节{}不存在", chapter_id);
                return Err(Exception::UpstreamStatus(404));
            }
            Err(Exception::UpstreamStatus(code)) => {
                warn!("at-home服务返回HTTP {}，章节{}", code, chapter_id);
                return Err(Exception::UpstreamUnavailable(format!(
                    "At-Home server returned HTTP {}",
                    code
                )));
            }
            Err(e) => {
                warn!("请求章节{}的at-home元数据失败: {}", chapter_id, e);
                return Err(e);
            }
        };

        String::from_utf8(body.to_vec()).map_err(|_| {
            Exception::MalformedUpstreamResponse("at-home response is not UTF-8".to_string())
        })
    }
}
