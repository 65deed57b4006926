// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use chrono::{DateTime, Local, Utc};
use log::debug;

use crate::param::MIME_TYPES;

/// 根据文件名后缀推断图片的 MIME 类型，无法识别时按 JPEG 处理
pub fn get_mime(filename: &str) -> &'static str {
    let extension = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => {
            debug!("文件名{}没有扩展名，使用默认MIME类型", filename);
            return fallback_mime();
        }
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => v,
        None => fallback_mime(),
    }
}

fn fallback_mime() -> &'static str {
    MIME_TYPES.get("_").copied().unwrap_or("image/jpeg")
}

/// 解码 URL 中的 `%XX` 转义序列。
///
/// 遇到不完整或非法的转义、或解码结果不是合法 UTF-8 时返回 `None`。
/// `+` 不做特殊处理。
pub fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return None;
            }
            let hi = hex_value(bytes[i + 1])?;
            let lo = hex_value(bytes[i + 2])?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// HTTP `Date` 头使用的 IMF-fixdate 格式
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 健康检查接口中的本地时间戳
pub fn format_timestamp(date: &DateTime<Local>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}
