// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 解析器模块
//!
//! 把章节 ID 解析为 CDN 地址、会话 hash 和合法文件名集合，并负责：
//! 1. 先查 `ResolutionCache`，命中则不访问上游。
//! 2. 未命中时向 at-home 接口发起**一次**请求（不重试），校验后写入缓存。
//! 3. 校验文件名是否属于所选画质的集合，拼出最终的资源 URL。
//!
//! 同一章节的并发刷新会被合并：只有一个请求访问上游，其余请求等待并共享同一个结果，
//! 包括失败时的错误，因此不会出现等待者在前一次失败后逐个重试的情况。

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::{
    at_home::parse_at_home,
    cache::ResolutionCache,
    delivery::{quality_segment, ResolvedDelivery},
    exception::Exception,
    upstream::UpstreamClient,
};

pub struct Resolver {
    cache: ResolutionCache,
    upstream: UpstreamClient,
}

impl Resolver {
    pub fn new(upstream: UpstreamClient, ttl: Duration) -> Self {
        Self {
            cache: ResolutionCache::new(ttl),
            upstream,
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// 解析章节的投递元数据。
    ///
    /// # 错误处理
    /// - 元数据请求失败或超时：`UpstreamUnavailable`（上游报告 404 时为 `UpstreamStatus(404)`）。
    /// - 响应缺少 baseUrl、hash 或页面列表：`MalformedUpstreamResponse`。
    ///
    /// 失败时不会写入缓存。
    pub async fn resolve(&self, chapter_id: &str) -> Result<Arc<ResolvedDelivery>, Exception> {
        let lookup = self
            .cache
            .get_or_refresh(chapter_id, self.refresh(chapter_id))
            .await?;
        match lookup.refreshed {
            true => {
                info!(
                    "章节{}解析完成：{}页，省流{}页",
                    chapter_id,
                    lookup.delivery.standard_filenames().len(),
                    lookup.delivery.reduced_filenames().len()
                );
                self.cache.purge_expired().await;
            }
            false => debug!("章节{}的解析缓存命中", chapter_id),
        }
        Ok(lookup.delivery)
    }

    // 向上游请求一次（不重试）并解析
    async fn refresh(&self, chapter_id: &str) -> Result<Arc<ResolvedDelivery>, Exception> {
        debug!("章节{}的解析缓存未命中，向上游刷新", chapter_id);
        let body = self.upstream.fetch_metadata(chapter_id).await?;
        Ok(Arc::new(parse_at_home(chapter_id, &body)?))
    }

    /// 文件名是否属于所选画质的集合。原画质与省流集合不可互换。
    pub fn validate_filename(delivery: &ResolvedDelivery, filename: &str, use_reduced: bool) -> bool {
        delivery.filenames(use_reduced).contains(filename)
    }

    /// 与 `validate_filename` 相同，但以 `FilenameNotFound` 表示拒绝
    pub fn require_filename(
        delivery: &ResolvedDelivery,
        filename: &str,
        use_reduced: bool,
    ) -> Result<(), Exception> {
        match Self::validate_filename(delivery, filename, use_reduced) {
            true => Ok(()),
            false => Err(Exception::FilenameNotFound(filename.to_string())),
        }
    }

    /// 拼出资源 URL：`{baseUrl}/{quality}/{contentHash}/{filename}`
    pub fn build_asset_url(delivery: &ResolvedDelivery, filename: &str, use_reduced: bool) -> String {
        format!(
            "{}/{}/{}/{}",
            delivery.base_url(),
            quality_segment(use_reduced),
            delivery.content_hash(),
            filename
        )
    }
}
