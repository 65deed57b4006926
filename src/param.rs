// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了 `mangaproxy` 遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 代理用到的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 图片类 MIME 类型映射表。
//! - 上游 at-home 服务约定的路径片段与缓存策略。
//! - HTTP 方法、版本的强类型枚举。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::time::Duration;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "mangaproxy";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 原画质图片在 CDN 上的路径片段
pub const QUALITY_DATA: &str = "data";

/// 省流（data-saver）图片在 CDN 上的路径片段
pub const QUALITY_DATA_SAVER: &str = "data-saver";

/// at-home 解析结果的默认有效期：3 分钟
pub const DEFAULT_RESOLUTION_TTL: Duration = Duration::from_secs(180);

/// 章节页面图片的浏览器缓存策略（1 天）
pub const PAGE_CACHE_CONTROL: &str = "public, max-age=86400";

/// 封面图片的浏览器缓存策略（7 天，封面 URL 是稳定的）
pub const COVER_CACHE_CONTROL: &str = "public, max-age=604800";

lazy_static! {
    /// 服务器当前允许处理的 HTTP 方法列表。
    ///
    /// 用于在收到请求时进行初步过滤，不在该列表中的方法将触发 405 Method Not Allowed。
    pub static ref ALLOWED_METHODS: Vec<HttpRequestMethod> = {
        vec![
            HttpRequestMethod::Get,
            HttpRequestMethod::Head,
            HttpRequestMethod::Options,
        ]
    };
}

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 只收录代理实际会返回的状态码。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(204, "No Content");
        map.insert(400, "Bad Request");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(408, "Request Timeout");
        map.insert(413, "Content Too Large");
        map.insert(500, "Internal Server Error");
        map.insert(502, "Bad Gateway");
        map.insert(504, "Gateway Timeout");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表。
    ///
    /// 代理只转发图片，因此只保留图片格式；无法识别的后缀按 JPEG 处理。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("gif", "image/gif");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("webp", "image/webp");
        // 兜底类型
        map.insert("_", "image/jpeg");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
    /// 查询服务器支持的选项（CORS 预检）
    Options,
}

use std::fmt;

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
        }
    }
}
