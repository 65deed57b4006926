// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 投递元数据模块
//!
//! `ResolvedDelivery` 是一次 at-home 解析的结果：CDN 根地址、会话 hash
//! 以及两套合法文件名集合。构造完成后不可变，缓存中以 `Arc` 共享。

use std::collections::BTreeSet;

use crate::{
    exception::Exception,
    param::{QUALITY_DATA, QUALITY_DATA_SAVER},
};

/// 一个章节的图片投递元数据。
///
/// 存在即满足：`base_url`、`content_hash` 非空，`standard_filenames` 非空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDelivery {
    chapter_id: String,
    base_url: String,
    content_hash: String,
    standard_filenames: BTreeSet<String>,
    reduced_filenames: BTreeSet<String>,
}

impl ResolvedDelivery {
    /// 构造并校验投递元数据。
    ///
    /// 缺少 base URL、hash，或原画质文件名集合为空时返回
    /// `MalformedUpstreamResponse`；省流集合允许为空。
    pub fn new(
        chapter_id: &str,
        base_url: &str,
        content_hash: &str,
        standard_filenames: BTreeSet<String>,
        reduced_filenames: BTreeSet<String>,
    ) -> Result<Self, Exception> {
        let base_url = base_url.trim().trim_end_matches('/');
        let content_hash = content_hash.trim();
        if base_url.is_empty() {
            return Err(Exception::MalformedUpstreamResponse(
                "missing baseUrl".to_string(),
            ));
        }
        if content_hash.is_empty() {
            return Err(Exception::MalformedUpstreamResponse(
                "missing chapter hash".to_string(),
            ));
        }
        if standard_filenames.is_empty() {
            return Err(Exception::MalformedUpstreamResponse(
                "no page data found".to_string(),
            ));
        }
        Ok(Self {
            chapter_id: chapter_id.to_string(),
            base_url: base_url.to_string(),
            content_hash: content_hash.to_string(),
            standard_filenames,
            reduced_filenames,
        })
    }
}

// --- Getter 访问器实现 ---

impl ResolvedDelivery {
    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn standard_filenames(&self) -> &BTreeSet<String> {
        &self.standard_filenames
    }

    pub fn reduced_filenames(&self) -> &BTreeSet<String> {
        &self.reduced_filenames
    }

    /// 按画质选择对应的文件名集合，两套集合不可混用
    pub fn filenames(&self, use_reduced: bool) -> &BTreeSet<String> {
        match use_reduced {
            true => &self.reduced_filenames,
            false => &self.standard_filenames,
        }
    }
}

/// 画质对应的 CDN 路径片段
pub fn quality_segment(use_reduced: bool) -> &'static str {
    match use_reduced {
        true => QUALITY_DATA_SAVER,
        false => QUALITY_DATA,
    }
}
