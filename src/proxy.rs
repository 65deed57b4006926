// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 代理门面模块
//!
//! 路由层唯一调用的入口：
//! - `get_page_image`：校验输入 → 解析章节 → 校验文件名 → 拼 URL → 抓取。
//! - `get_cover_image`：校验输入 → 拼稳定的封面 URL → 直接抓取。
//!
//! 这里也是**唯一**把 `Exception` 映射为 HTTP 状态码与错误消息的地方。
//! 任何抓取失败都会以错误返回，绝不会以空的或截断的 200 响应掩盖。

use std::sync::Arc;

use bytes::Bytes;
use lazy_static::lazy_static;
use log::{debug, error, warn};
use regex::Regex;
use serde_derive::Serialize;

use crate::{
    config::Config,
    exception::Exception,
    fetcher::ImageFetcher,
    resolver::Resolver,
    upstream::{Transport, UpstreamClient},
};

lazy_static! {
    /// 章节页面文件名：字母数字、连字符、下划线，加一个图片扩展名
    static ref PAGE_FILENAME: Regex =
        Regex::new(r"^[a-zA-Z0-9\-_]+\.(jpg|jpeg|png|gif|webp)$").unwrap();
    /// 封面文件名：主体部分额外允许 '.'
    static ref COVER_FILENAME: Regex =
        Regex::new(r"^[a-zA-Z0-9\-_\.]+\.(jpg|jpeg|png|gif|webp)$").unwrap();
}

/// 返回给客户端的错误，序列化为 `{"error": ..., "status": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyError {
    #[serde(rename = "error")]
    message: String,
    status: u16,
    #[serde(skip)]
    kind: Exception,
}

impl ProxyError {
    fn new(status: u16, message: String, kind: Exception) -> Self {
        Self {
            message,
            status,
            kind,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &Exception {
        &self.kind
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!(r#"{{"error":"Internal server error","status":{}}}"#, self.status))
    }

    /// 页面图片路径的错误映射
    fn from_page(kind: Exception) -> Self {
        let (status, message) = match &kind {
            Exception::InvalidInput(msg) => (400, msg.clone()),
            Exception::FilenameNotFound(_) => {
                (404, "Filename not found in chapter data".to_string())
            }
            Exception::UpstreamStatus(404) => (404, "Image not found".to_string()),
            Exception::UpstreamUnavailable(_) => {
                (502, "Failed to connect to MangaDex servers".to_string())
            }
            other => (500, format!("Failed to fetch image: {}", other)),
        };
        Self::new(status, message, kind)
    }

    /// 封面图片路径的错误映射（封面没有元数据层）
    fn from_cover(kind: Exception) -> Self {
        let (status, message) = match &kind {
            Exception::InvalidInput(msg) => (400, msg.clone()),
            Exception::UpstreamStatus(404) => (404, "Cover not found".to_string()),
            Exception::UpstreamUnavailable(_) => {
                (502, "Failed to connect to MangaDex servers".to_string())
            }
            other => (500, format!("Failed to fetch cover: {}", other)),
        };
        Self::new(status, message, kind)
    }

    /// 路由层自身产生的错误（404 路由、400 查询参数等）
    pub fn from_route(status: u16, message: &str) -> Self {
        let kind = Exception::InvalidInput(message.to_string());
        Self::new(status, message.to_string(), kind)
    }
}

pub struct ProxyFacade {
    resolver: Resolver,
    fetcher: ImageFetcher,
    cover_base_url: String,
}

impl ProxyFacade {
    pub fn new(resolver: Resolver, fetcher: ImageFetcher, cover_base_url: &str) -> Self {
        Self {
            resolver,
            fetcher,
            cover_base_url: cover_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 用同一个传输层组装解析器与抓取器
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let upstream = UpstreamClient::from_config(Arc::clone(&transport), config);
        let resolver = Resolver::new(upstream, config.cache_ttl());
        let fetcher = ImageFetcher::from_config(transport, config);
        Self::new(resolver, fetcher, config.cover_base_url())
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// 代理一张章节页面图片
    pub async fn get_page_image(
        &self,
        chapter_id: &str,
        filename: &str,
        use_reduced: bool,
        id: u128,
    ) -> Result<Bytes, ProxyError> {
        self.page_image(chapter_id, filename, use_reduced, id)
            .await
            .map_err(|e| {
                error!(
                    "[ID{}]代理章节{}的文件{}失败: {}",
                    id, chapter_id, filename, e
                );
                ProxyError::from_page(e)
            })
    }

    /// 代理一张封面图片
    pub async fn get_cover_image(
        &self,
        manga_id: &str,
        filename: &str,
        id: u128,
    ) -> Result<Bytes, ProxyError> {
        self.cover_image(manga_id, filename, id).await.map_err(|e| {
            error!(
                "[ID{}]代理漫画{}的封面{}失败: {}",
                id, manga_id, filename, e
            );
            ProxyError::from_cover(e)
        })
    }

    async fn page_image(
        &self,
        chapter_id: &str,
        filename: &str,
        use_reduced: bool,
        id: u128,
    ) -> Result<Bytes, Exception> {
        require_non_empty(chapter_id, "Missing chapter ID")?;
        require_non_empty(filename, "Missing filename")?;
        if !is_valid_page_filename(filename) {
            warn!("[ID{}]非法的页面文件名：{}", id, filename);
            return Err(Exception::InvalidInput("Invalid filename format".to_string()));
        }
        if !is_valid_identifier(chapter_id) {
            warn!("[ID{}]非法的章节ID：{}", id, chapter_id);
            return Err(Exception::InvalidInput("Invalid chapter ID".to_string()));
        }

        let delivery = self.resolver.resolve(chapter_id).await?;
        Resolver::require_filename(&delivery, filename, use_reduced)?;
        let url = Resolver::build_asset_url(&delivery, filename, use_reduced);
        debug!("[ID{}]资源URL: {}", id, url);

        self.fetcher.fetch(&url).await
    }

    async fn cover_image(&self, manga_id: &str, filename: &str, id: u128) -> Result<Bytes, Exception> {
        require_non_empty(manga_id, "Missing manga ID")?;
        require_non_empty(filename, "Missing filename")?;
        if !is_valid_cover_filename(filename) {
            warn!("[ID{}]非法的封面文件名：{}", id, filename);
            return Err(Exception::InvalidInput("Invalid filename format".to_string()));
        }
        if !is_valid_identifier(manga_id) {
            warn!("[ID{}]非法的漫画ID：{}", id, manga_id);
            return Err(Exception::InvalidInput("Invalid manga ID".to_string()));
        }

        let url = self.cover_url(manga_id, filename);
        debug!("[ID{}]封面URL: {}", id, url);
        self.fetcher.fetch_direct(&url).await
    }

    /// 稳定的封面 URL：`{cover_base_url}/{mangaId}/{filename}`
    pub fn cover_url(&self, manga_id: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.cover_base_url, manga_id, filename)
    }
}

fn require_non_empty(value: &str, message: &str) -> Result<(), Exception> {
    match value.trim().is_empty() {
        true => Err(Exception::InvalidInput(message.to_string())),
        false => Ok(()),
    }
}

pub fn is_valid_page_filename(filename: &str) -> bool {
    PAGE_FILENAME.is_match(filename)
}

pub fn is_valid_cover_filename(filename: &str) -> bool {
    // 单独的 ".." 片段也能匹配封面正则，这里额外排除
    COVER_FILENAME.is_match(filename) && !filename.starts_with('.') && !filename.contains("..")
}

/// 漫画 ID 会被直接拼进 URL 路径，只允许不含分隔符的安全字符
fn is_valid_identifier(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
