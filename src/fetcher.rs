// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 图片抓取模块
//!
//! 负责从 CDN 拉取图片字节。CDN 要求 `Referer` 与其站点策略匹配，
//! 因此每个请求都带上固定的 `Referer`、`User-Agent` 和 `Cache-Control: no-cache`。
//!
//! 章节页面走 `fetch`（URL 由解析结果拼出），封面走 `fetch_direct`
//! （URL 稳定，不经过解析缓存）。两条路径的失败都必须向上传播。

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, REFERER, USER_AGENT};

use crate::{config::Config, exception::Exception, upstream::Transport};

pub struct ImageFetcher {
    transport: Arc<dyn Transport>,
    referer: String,
    user_agent: String,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        referer: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            referer: referer.to_string(),
            user_agent: user_agent.to_string(),
            timeout,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(
            transport,
            config.referer(),
            config.user_agent(),
            config.fetch_timeout(),
        )
    }

    /// 抓取一张已通过校验的章节页面图片
    pub async fn fetch(&self, url: &str) -> Result<Bytes, Exception> {
        debug!("抓取页面图片: {}", url);
        let bytes = self.retrieve(url).await.map_err(|e| {
            warn!("抓取页面图片{}失败: {}", url, e);
            e
        })?;
        debug!("页面图片抓取完成，{} bytes", bytes.len());
        Ok(bytes)
    }

    /// 直接抓取封面图片，不经过 at-home 解析
    pub async fn fetch_direct(&self, url: &str) -> Result<Bytes, Exception> {
        debug!("抓取封面图片: {}", url);
        let bytes = self.retrieve(url).await.map_err(|e| {
            warn!("抓取封面图片{}失败: {}", url, e);
            e
        })?;
        debug!("封面图片抓取完成，{} bytes", bytes.len());
        Ok(bytes)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(&self.referer) {
            headers.insert(REFERER, referer);
        }
        if let Ok(ua) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers
    }

    async fn retrieve(&self, url: &str) -> Result<Bytes, Exception> {
        self.transport.get(url, self.headers(), self.timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockTransport;
    use mockall::predicate::*;

    fn fetcher(mock: MockTransport) -> ImageFetcher {
        ImageFetcher::new(
            Arc::new(mock),
            "https://mangadex.org/",
            "mangaproxy-test",
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_fetch_sends_required_headers() {
        let mut mock = MockTransport::new();
        mock.expect_get()
            .with(
                eq("https://cdn.example/data/h1/p1.png"),
                always(),
                eq(Duration::from_secs(30)),
            )
            .times(1)
            .returning(|_, headers, _| {
                assert_eq!(headers.get(REFERER).unwrap(), "https://mangadex.org/");
                assert_eq!(headers.get(USER_AGENT).unwrap(), "mangaproxy-test");
                assert_eq!(headers.get(CACHE_CONTROL).unwrap(), "no-cache");
                Ok(Bytes::from_static(b"\x89PNG"))
            });

        let bytes = fetcher(mock)
            .fetch("https://cdn.example/data/h1/p1.png")
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_fetch_direct_uses_same_headers() {
        let mut mock = MockTransport::new();
        mock.expect_get().times(1).returning(|_, headers, _| {
            assert!(headers.contains_key(REFERER));
            assert!(headers.contains_key(USER_AGENT));
            Ok(Bytes::from_static(b"cover"))
        });

        let bytes = fetcher(mock)
            .fetch_direct("https://uploads.example/covers/m1/c.jpg")
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"cover");
    }

    #[tokio::test]
    async fn test_fetch_status_error_is_surfaced() {
        let mut mock = MockTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _, _| Err(Exception::UpstreamStatus(403)));

        let result = fetcher(mock).fetch("https://cdn.example/data/h1/p1.png").await;
        assert_eq!(result, Err(Exception::UpstreamStatus(403)));
    }

    #[tokio::test]
    async fn test_fetch_direct_timeout_is_surfaced() {
        let mut mock = MockTransport::new();
        mock.expect_get().times(1).returning(|_, _, _| {
            Err(Exception::UpstreamUnavailable("request timed out".to_string()))
        });

        let result = fetcher(mock).fetch_direct("https://uploads.example/c.jpg").await;
        assert!(matches!(result, Err(Exception::UpstreamUnavailable(_))));
    }
}
