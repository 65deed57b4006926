// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use moka::future::Cache;

use crate::delivery::ResolvedDelivery;
use crate::exception::Exception;

/// 一次 `get_or_refresh` 的结果
pub struct Lookup {
    pub delivery: Arc<ResolvedDelivery>,
    /// 是否由本次调用刷新得到（命中缓存或等待他人刷新时为 false）
    pub refreshed: bool,
}

/// at-home 解析结果的限时缓存。
///
/// 条目写入满 TTL 后即视为不存在，物理删除由 moka 在维护任务中完成。
/// 缓存只受 TTL 与 TTL 窗口内不同章节数量的约束，没有容量上限。
pub struct ResolutionCache {
    cache: Cache<String, Arc<ResolvedDelivery>>,
    ttl: Duration,
}

impl ResolutionCache {
    // 根据有效期构造
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();
        Self { cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // 查询有效缓存
    pub async fn get(&self, chapter_id: &str) -> Option<Arc<ResolvedDelivery>> {
        self.cache.get(chapter_id).await
    }

    // 放入（整体替换旧条目，后写者胜出）
    pub async fn put(&self, chapter_id: &str, delivery: Arc<ResolvedDelivery>) {
        self.cache.insert(chapter_id.to_string(), delivery).await;
    }

    /// 命中则直接返回，否则执行 `refresh` 并写入缓存。
    ///
    /// 同一章节的并发调用只会执行一次 `refresh`，其余调用等待并共享同一个结果，
    /// 失败时同样共享同一个错误。失败的结果不会写入缓存。
    pub async fn get_or_refresh<F>(&self, chapter_id: &str, refresh: F) -> Result<Lookup, Exception>
    where
        F: Future<Output = Result<Arc<ResolvedDelivery>, Exception>>,
    {
        match self
            .cache
            .entry_by_ref(chapter_id)
            .or_try_insert_with(refresh)
            .await
        {
            Ok(entry) => {
                let refreshed = entry.is_fresh();
                Ok(Lookup {
                    delivery: entry.into_value(),
                    refreshed,
                })
            }
            Err(shared) => Err(Exception::clone(&shared)),
        }
    }

    // 执行挂起的维护任务，过期条目在此时被物理删除
    pub async fn purge_expired(&self) {
        self.cache.run_pending_tasks().await;
        debug!("解析缓存维护完成，当前条目数：{}", self.cache.entry_count());
    }

    /// 条目数。moka 的计数在维护任务之后才准确，需要精确值时先调用 `purge_expired`。
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
