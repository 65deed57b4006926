// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模块
//!
//! 将请求路径映射到代理的几个端点：
//! - `{prefix}/cover/{mangaId}/{filename}`：封面图片。
//! - `{prefix}/{chapterId}/{filename}[?dataSaver=true|false]`：章节页面图片。
//! - `/healthcheck` 与 `/healthcheck/status`：健康检查。
//!
//! 路径片段在这里完成百分号解码，之后才交给门面做格式校验，
//! 因此编码过的 `..%2F` 同样会被文件名规则拒绝。

use crate::util::percent_decode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Page {
        chapter_id: String,
        filename: String,
        use_reduced: bool,
    },
    Cover {
        manga_id: String,
        filename: String,
    },
    Health,
    HealthStatus,
    /// 路径能匹配端点，但参数无法解析
    BadRequest(String),
    NotFound,
}

/// 匹配路由。`data_saver` 是查询参数 `dataSaver` 的原始值（已解码）。
pub fn route(path: &str, data_saver: Option<&str>, prefix: &str) -> Route {
    match path {
        "/healthcheck" | "/healthcheck/" => return Route::Health,
        "/healthcheck/status" => return Route::HealthStatus,
        _ => {}
    }

    let rest = match path
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('/'))
    {
        Some(rest) => rest,
        None => return Route::NotFound,
    };

    let raw_segments: Vec<&str> = rest.split('/').collect();
    let mut segments = Vec::with_capacity(raw_segments.len());
    for raw in raw_segments {
        match percent_decode(raw) {
            Some(s) => segments.push(s),
            None => return Route::BadRequest("Invalid path encoding".to_string()),
        }
    }

    match segments.as_slice() {
        [cover, manga_id, filename] if cover == "cover" => Route::Cover {
            manga_id: manga_id.clone(),
            filename: filename.clone(),
        },
        [chapter_id, filename] => match parse_flag(data_saver) {
            Some(use_reduced) => Route::Page {
                chapter_id: chapter_id.clone(),
                filename: filename.clone(),
                use_reduced,
            },
            None => Route::BadRequest("Invalid dataSaver parameter".to_string()),
        },
        _ => Route::NotFound,
    }
}

/// 缺省或为空时为 `false`
fn parse_flag(value: Option<&str>) -> Option<bool> {
    let value = match value {
        Some(v) => v.trim(),
        None => return Some(false),
    };
    match value.to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "no" | "off" => Some(false),
        "true" | "1" | "yes" | "on" => Some(true),
        _ => None,
    }
}
