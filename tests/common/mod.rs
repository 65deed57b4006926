// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的假上游与代理启动工具

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mangaproxy::{
    config::Config,
    proxy::ProxyFacade,
    server::{handle_connection, ServerState},
    upstream::HttpTransport,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone)]
struct Reply {
    status: u16,
    body: Vec<u8>,
    delay: Duration,
    /// 声明的 Content-Length，与实际发送的字节数不同时用于模拟截断
    declared_len: Option<usize>,
}

/// 在随机端口上监听的假上游，同时扮演 at-home 接口与 CDN
pub struct FakeUpstream {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Reply>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Reply>>> = Arc::default();
        let requests: Arc<Mutex<Vec<(String, String)>>> = Arc::default();

        let routes_clone = Arc::clone(&routes);
        let requests_clone = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let routes = Arc::clone(&routes_clone);
                let requests = Arc::clone(&requests_clone);
                tokio::spawn(serve_one(stream, routes, requests));
            }
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.set_delayed(path, status, body, Duration::ZERO);
    }

    pub fn set_delayed(&self, path: &str, status: u16, body: impl Into<Vec<u8>>, delay: Duration) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Reply {
                status,
                body: body.into(),
                delay,
                declared_len: None,
            },
        );
    }

    /// 声明 `declared_len` 字节，但只发送 `body` 后就关闭连接
    pub fn set_truncated(&self, path: &str, declared_len: usize, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Reply {
                status: 200,
                body: body.into(),
                delay: Duration::ZERO,
                declared_len: Some(declared_len),
            },
        );
    }

    /// 以本服务器为 CDN 的 at-home 响应
    pub fn set_at_home(&self, chapter_id: &str, hash: &str, data: &[&str], data_saver: &[&str]) {
        let body = serde_json::json!({
            "result": "ok",
            "baseUrl": self.url(),
            "chapter": {
                "hash": hash,
                "data": data,
                "dataSaver": data_saver,
            }
        })
        .to_string();
        self.set(&format!("/at-home/server/{}", chapter_id), 200, body);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    pub fn total_hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// 最近一次请求该路径时的原始请求头（小写）
    pub fn last_headers(&self, path: &str) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, h)| h.clone())
    }
}

async fn serve_one(
    mut stream: TcpStream,
    routes: Arc<Mutex<HashMap<String, Reply>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    let head = String::from_utf8_lossy(&buffer).to_string();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .unwrap_or("/")
        .to_string();
    requests
        .lock()
        .unwrap()
        .push((path.clone(), head.to_ascii_lowercase()));

    let reply = routes.lock().unwrap().get(&path).cloned().unwrap_or(Reply {
        status: 404,
        body: b"not found".to_vec(),
        delay: Duration::ZERO,
        declared_len: None,
    });
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let header = format!(
        "HTTP/1.1 {} Fake\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        reply.status,
        reply.declared_len.unwrap_or(reply.body.len())
    );
    let _ = stream.write_all(header.as_bytes()).await;
    let _ = stream.write_all(&reply.body).await;
    let _ = stream.shutdown().await;
}

/// 指向假上游、不经过系统代理的配置
pub fn config_for(upstream: &FakeUpstream) -> Config {
    Config::new()
        .with_api_base_url(&upstream.url())
        .with_cover_base_url(&format!("{}/covers", upstream.url()))
        .with_system_proxy(false)
}

pub fn facade_for(config: &Config) -> ProxyFacade {
    let transport = HttpTransport::from_config(config).unwrap();
    ProxyFacade::from_config(config, Arc::new(transport))
}

/// 在随机端口上启动完整的代理服务，返回监听地址
pub async fn start_proxy(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let facade = Arc::new(facade_for(&config));
    let state = Arc::new(ServerState::new(facade, Arc::new(config)));

    tokio::spawn(async move {
        let mut id: u128 = 0;
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                handle_connection(&mut stream, id, &state).await;
            });
            id += 1;
        }
    });
    addr
}

pub async fn send_request(addr: SocketAddr, raw: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    out
}

/// 拆分为状态码、头部（名称小写）和正文
pub fn parse_response(response: &[u8]) -> (u16, Vec<(String, String)>, Vec<u8>) {
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or(response.len());
    let head = String::from_utf8_lossy(&response[..split]).to_string();
    let body = response.get(split + 4..).unwrap_or_default().to_vec();

    let mut lines = head.split("\r\n");
    let status_code = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|c| c.parse::<u16>().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|l| l.split_once(": "))
        .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
        .collect();
    (status_code, headers, body)
}

pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}
