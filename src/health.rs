// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 健康检查接口的 JSON 正文

use std::time::Duration;

use chrono::Local;
use serde_derive::Serialize;

use crate::{param::SERVER_NAME, util::format_timestamp};

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    message: &'static str,
    timestamp: String,
    uptime: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CacheStatus {
    entries: u64,
    ttl_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    timestamp: String,
    server: &'static str,
    version: &'static str,
    cache: CacheStatus,
    uptime_secs: u64,
}

/// `GET /healthcheck`
pub fn health_body() -> String {
    let body = Health {
        status: "OK",
        message: "Server is running",
        timestamp: format_timestamp(&Local::now()),
        uptime: "healthy",
    };
    serde_json::to_string(&body).unwrap_or_else(|_| r#"{"status":"OK"}"#.to_string())
}

/// `GET /healthcheck/status`
pub fn status_body(cache_entries: u64, cache_ttl: Duration, uptime: Duration) -> String {
    let body = HealthStatus {
        status: "OK",
        timestamp: format_timestamp(&Local::now()),
        server: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
        cache: CacheStatus {
            entries: cache_entries,
            ttl_secs: cache_ttl.as_secs(),
        },
        uptime_secs: uptime.as_secs(),
    };
    serde_json::to_string(&body).unwrap_or_else(|_| r#"{"status":"OK"}"#.to_string())
}
