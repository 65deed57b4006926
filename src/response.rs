// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{
    param::*,
    proxy::ProxyError,
    util::format_date,
};

use bytes::Bytes;
use chrono::prelude::*;
use log::{debug, error};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_length: u64,
    date: DateTime<Utc>,
    server_name: String,
    allow: Option<Vec<HttpRequestMethod>>,
    cache_control: Option<String>,
    content: Option<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_length: 0,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            allow: None,
            cache_control: None,
            content: None,
        }
    }

    /// 图片响应。`headonly` 时只保留头部，`Content-Length` 仍为图片实际大小。
    pub fn from_image(bytes: Bytes, mime: &str, cache_control: &str, headonly: bool) -> Self {
        let mut response = Self::new();
        response.content_type = Some(mime.to_string());
        response.cache_control = Some(cache_control.to_string());
        response.content_length = bytes.len() as u64;
        response.content = match headonly {
            true => None,
            false => Some(bytes),
        };
        response
    }

    /// JSON 响应
    pub fn from_json(code: u16, body: String, headonly: bool) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_type = Some("application/json".to_string());
        response.content_length = body.len() as u64;
        response.content = match headonly {
            true => None,
            false => Some(Bytes::from(body)),
        };
        response
    }

    pub fn from_proxy_error(err: &ProxyError, headonly: bool) -> Self {
        Self::from_json(err.status(), err.to_json(), headonly)
    }

    /// 仅由状态码构成的错误响应，正文为 `{"error": 原因短语, "status": 状态码}`
    pub fn from_status_code(code: u16, id: u128) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        debug!("[ID{}]构建{}响应", id, code);
        let body = json!({
            "error": response.information,
            "status": code,
        })
        .to_string();
        if code == 405 {
            response.allow = Some(ALLOWED_METHODS.to_vec());
        }
        response.content_type = Some("application/json".to_string());
        response.content_length = body.len() as u64;
        response.content = Some(Bytes::from(body));
        response
    }

    /// CORS 预检的 204 响应
    pub fn response_options() -> Self {
        let mut response = Self::new();
        response.set_code(204);
        response.allow = Some(ALLOWED_METHODS.to_vec());
        response
    }

    pub fn response_404(path: &str, headonly: bool) -> Self {
        let body = json!({
            "error": "Endpoint not found",
            "status": 404,
            "path": path,
        })
        .to_string();
        Self::from_json(404, body, headonly)
    }

    fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&info) => info.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let status_code: &str = &self.status_code.to_string();
        let information: &str = &self.information;
        let content_length: &str = &self.content_length.to_string();
        let date: &str = &format_date(&self.date);
        let server: &str = &self.server_name;

        let header = [
            version,
            " ",
            status_code,
            " ",
            information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            content_length,
            CRLF,
            match &self.cache_control {
                Some(c) => ["Cache-Control: ", c, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Date: ",
            date,
            CRLF,
            "Server: ",
            server,
            CRLF,
            "Access-Control-Allow-Origin: *",
            CRLF,
            match &self.allow {
                Some(a) => {
                    let allow_str = a
                        .iter()
                        .map(|m| m.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    [
                        "Allow: ",
                        &allow_str,
                        CRLF,
                        "Access-Control-Allow-Methods: ",
                        &allow_str,
                        CRLF,
                    ]
                    .concat()
                }
                None => "".to_string(),
            }
            .as_str(),
            "Connection: close",
            CRLF,
            CRLF,
        ]
        .concat();
        [
            header.as_bytes(),
            match &self.content {
                Some(c) => c,
                None => b"",
            },
        ]
        .concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.content.as_ref()
    }
}
