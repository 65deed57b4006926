// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! at-home 服务响应的解析边界。
//!
//! 期望的报文结构：
//! `{"baseUrl": "...", "chapter": {"hash": "...", "data": [...], "dataSaver": [...]}}`

use std::collections::BTreeSet;

use serde_derive::Deserialize;

use crate::{delivery::ResolvedDelivery, exception::Exception};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeResponse {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    chapter: AtHomeChapter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    data: Vec<String>,
    // 上游可能给出 null，与缺失同样视为没有省流页面
    #[serde(default)]
    data_saver: Option<Vec<String>>,
}

/// 解析 at-home 响应体，得到一个校验过的 `ResolvedDelivery`。
///
/// JSON 无法解析、字段类型不对、或缺少必需字段时一律返回
/// `MalformedUpstreamResponse`，不会产生部分填充的结果。
pub fn parse_at_home(chapter_id: &str, body: &str) -> Result<ResolvedDelivery, Exception> {
    let response: AtHomeResponse = serde_json::from_str(body)
        .map_err(|e| Exception::MalformedUpstreamResponse(format!("invalid JSON: {}", e)))?;

    let standard: BTreeSet<String> = collect_filenames(response.chapter.data);
    let reduced: BTreeSet<String> =
        collect_filenames(response.chapter.data_saver.unwrap_or_default());

    ResolvedDelivery::new(
        chapter_id,
        &response.base_url,
        &response.chapter.hash,
        standard,
        reduced,
    )
}

fn collect_filenames(names: Vec<String>) -> BTreeSet<String> {
    names.into_iter().filter(|n| !n.is_empty()).collect()
}
