// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理模块
//!
//! 负责单个 TCP 流的生命周期：读取请求头、解析、路由、调用代理门面，
//! 构建并发送响应，最后写一行访问日志。每个连接只处理一个请求。

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::{
    config::Config,
    exception::Exception,
    health::{health_body, status_body},
    param::*,
    proxy::{ProxyError, ProxyFacade},
    request::Request,
    response::Response,
    router::{route, Route},
    util::get_mime,
};

/// 所有连接共享的服务端状态
pub struct ServerState {
    facade: Arc<ProxyFacade>,
    config: Arc<Config>,
    started_at: Instant,
}

impl ServerState {
    pub fn new(facade: Arc<ProxyFacade>, config: Arc<Config>) -> Self {
        Self {
            facade,
            config,
            started_at: Instant::now(),
        }
    }

    pub fn facade(&self) -> &ProxyFacade {
        &self.facade
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

enum ReadOutcome {
    Head(Vec<u8>),
    TooLarge,
    Failed,
}

async fn read_head<S>(stream: &mut S, id: u128, limit: usize) -> ReadOutcome
where
    S: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => return ReadOutcome::Head(buffer), // 客户端关闭了写端
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if header_complete(&buffer) {
                    return ReadOutcome::Head(buffer);
                }
                if buffer.len() >= limit {
                    return ReadOutcome::TooLarge;
                }
            }
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                return ReadOutcome::Failed;
            }
        }
    }
}

/// # 连接处理器
///
/// 读取直到请求头结束（`\r\n\r\n`）。请求头超过 `max_request_bytes` 时返回 413，
/// 在 `read_timeout` 内没有读完请求头时返回 408。
pub async fn handle_connection<S>(stream: &mut S, id: u128, state: &ServerState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = state.config.max_request_bytes();
    let read_timeout = state.config.read_timeout();

    let buffer = match timeout(read_timeout, read_head(stream, id, limit)).await {
        Ok(ReadOutcome::Head(buffer)) => buffer,
        Ok(ReadOutcome::TooLarge) => {
            warn!("[ID{}]请求头超过{}字节，返回413", id, limit);
            send(stream, id, &Response::from_status_code(413, id)).await;
            return;
        }
        Ok(ReadOutcome::Failed) => return,
        Err(_) => {
            warn!("[ID{}]{}秒内未收到完整请求头，返回408", id, read_timeout.as_secs());
            send(stream, id, &Response::from_status_code(408, id)).await;
            return;
        }
    };
    if buffer.is_empty() {
        debug!("[ID{}]连接在发送请求前关闭", id);
        return;
    }
    debug!("[ID{}]HTTP请求接收完毕", id);

    let start_time = Instant::now();

    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            let code = match e {
                Exception::UnSupportedRequestMethod => 405,
                _ => 400,
            };
            warn!("[ID{}]解析HTTP请求失败: {}，返回{}", id, e, code);
            send(stream, id, &Response::from_status_code(code, id)).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    let response = dispatch(&request, id, state).await;

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        request.version(),
        request.path(),
        request.method(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    send(stream, id, &response).await;
}

/// 根据路由结果生成响应
pub async fn dispatch(request: &Request, id: u128, state: &ServerState) -> Response {
    if request.method() == HttpRequestMethod::Options {
        debug!("[ID{}]请求方法为OPTIONS", id);
        return Response::response_options();
    }
    let headonly = request.method() == HttpRequestMethod::Head;

    let data_saver = request.query_param("dataSaver");
    let matched = route(
        request.path(),
        data_saver.as_deref(),
        state.config.route_prefix(),
    );
    debug!("[ID{}]路由匹配结果: {:?}", id, matched);

    match matched {
        Route::Page {
            chapter_id,
            filename,
            use_reduced,
        } => match state
            .facade
            .get_page_image(&chapter_id, &filename, use_reduced, id)
            .await
        {
            Ok(bytes) => {
                Response::from_image(bytes, get_mime(&filename), PAGE_CACHE_CONTROL, headonly)
            }
            Err(e) => Response::from_proxy_error(&e, headonly),
        },
        Route::Cover { manga_id, filename } => {
            match state.facade.get_cover_image(&manga_id, &filename, id).await {
                Ok(bytes) => Response::from_image(
                    bytes,
                    get_mime(&filename),
                    COVER_CACHE_CONTROL,
                    headonly,
                ),
                Err(e) => Response::from_proxy_error(&e, headonly),
            }
        }
        Route::Health => Response::from_json(200, health_body(), headonly),
        Route::HealthStatus => {
            let cache = state.facade.resolver().cache();
            cache.purge_expired().await;
            let body = status_body(cache.len(), cache.ttl(), state.started_at.elapsed());
            Response::from_json(200, body, headonly)
        }
        Route::BadRequest(message) => {
            warn!("[ID{}]请求参数错误：{}", id, message);
            Response::from_proxy_error(&ProxyError::from_route(400, &message), headonly)
        }
        Route::NotFound => {
            warn!("[ID{}]请求的路径：{} 不存在，返回404", id, request.path());
            Response::response_404(request.path(), headonly)
        }
    }
}

fn header_complete(buffer: &[u8]) -> bool {
    buffer.windows(4).any(|w| w == b"\r\n\r\n")
}

async fn send<S>(stream: &mut S, id: u128, response: &Response)
where
    S: AsyncWrite + Unpin,
{
    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    if let Err(e) = stream.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockTransport;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::duplex;

    fn state(mock: MockTransport) -> ServerState {
        let config = Config::new().with_api_base_url("https://api.example");
        let facade = ProxyFacade::from_config(&config, Arc::new(mock));
        ServerState::new(Arc::new(facade), Arc::new(config))
    }

    async fn roundtrip(state: &ServerState, raw: &[u8]) -> String {
        let (mut client, mut server) = duplex(64 * 1024);
        client.write_all(raw).await.unwrap();
        client.shutdown().await.unwrap();
        handle_connection(&mut server, 1, state).await;
        drop(server);
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).to_string()
    }

    #[tokio::test]
    async fn test_healthcheck() {
        let state = state(MockTransport::new());
        let out = roundtrip(&state, b"GET /healthcheck HTTP/1.1\r\nHost: x\r\n\r\n").await;

        assert!(out.starts_with("HTTP/1.1 200 OK"));
        assert!(out.contains("Content-Type: application/json"));
        assert!(out.contains(r#""message":"Server is running""#));
    }

    #[tokio::test]
    async fn test_page_request_end_to_end() {
        let mut mock = MockTransport::new();
        mock.expect_get().times(2).returning(|url, _, _| {
            if url.ends_with("/at-home/server/abc") {
                Ok(Bytes::from_static(
                    br#"{"baseUrl":"https://cdn.example","chapter":{"hash":"h1","data":["p1.png"],"dataSaver":[]}}"#,
                ))
            } else {
                assert_eq!(url, "https://cdn.example/data/h1/p1.png");
                Ok(Bytes::from_static(b"PNGDATA"))
            }
        });
        let state = state(mock);
        let out = roundtrip(
            &state,
            b"GET /proxy/mangadex/abc/p1.png HTTP/1.1\r\nUser-Agent: t\r\n\r\n",
        )
        .await;

        assert!(out.starts_with("HTTP/1.1 200 OK"));
        assert!(out.contains("Content-Type: image/png\r\n"));
        assert!(out.contains("Cache-Control: public, max-age=86400\r\n"));
        assert!(out.contains("Content-Length: 7\r\n"));
        assert!(out.ends_with("PNGDATA"));
    }

    #[tokio::test]
    async fn test_invalid_filename_is_400() {
        let state = state(MockTransport::new());
        let out = roundtrip(
            &state,
            b"GET /proxy/mangadex/abc/..%2F..%2Fetc%2Fpasswd HTTP/1.1\r\n\r\n",
        )
        .await;

        assert!(out.starts_with("HTTP/1.1 400 Bad Request"));
        assert!(out.ends_with(r#"{"error":"Invalid filename format","status":400}"#));
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let state = state(MockTransport::new());
        let out = roundtrip(&state, b"GET /nothing HTTP/1.1\r\n\r\n").await;

        assert!(out.starts_with("HTTP/1.1 404 Not Found"));
        assert!(out.contains(r#""path":"/nothing""#));
    }

    #[tokio::test]
    async fn test_post_is_405() {
        let state = state(MockTransport::new());
        let out = roundtrip(&state, b"POST /healthcheck HTTP/1.1\r\n\r\n").await;

        assert!(out.starts_with("HTTP/1.1 405 Method Not Allowed"));
        assert!(out.contains("Allow: GET, HEAD, OPTIONS"));
    }

    #[tokio::test]
    async fn test_options_is_204() {
        let state = state(MockTransport::new());
        let out = roundtrip(&state, b"OPTIONS /proxy/mangadex/abc/p1.png HTTP/1.1\r\n\r\n").await;

        assert!(out.starts_with("HTTP/1.1 204 No Content"));
        assert!(out.contains("Access-Control-Allow-Origin: *"));
    }

    #[tokio::test]
    async fn test_oversized_header_is_413() {
        let state = state(MockTransport::new());
        let mut raw = b"GET /healthcheck HTTP/1.1\r\nX-Pad: ".to_vec();
        raw.extend(std::iter::repeat(b'a').take(10_000));
        let out = roundtrip(&state, &raw).await;

        assert!(out.starts_with("HTTP/1.1 413 Content Too Large"));
    }

    #[tokio::test]
    async fn test_stalled_header_is_408() {
        let config = Config::new().with_read_timeout(Duration::from_secs(1));
        let facade = ProxyFacade::from_config(&config, Arc::new(MockTransport::new()));
        let state = ServerState::new(Arc::new(facade), Arc::new(config));

        // 只发送半个请求头，并保持连接不关闭
        let (mut client, mut server) = duplex(64 * 1024);
        client.write_all(b"GET /healthcheck HTTP/1.1\r\nHost: x").await.unwrap();

        let started = Instant::now();
        handle_connection(&mut server, 1, &state).await;
        assert!(started.elapsed() < Duration::from_secs(3));
        drop(server);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(String::from_utf8_lossy(&out).starts_with("HTTP/1.1 408 Request Timeout"));
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let state = state(MockTransport::new());
        let out = roundtrip(&state, b"HEAD /healthcheck HTTP/1.1\r\n\r\n").await;

        assert!(out.starts_with("HTTP/1.1 200 OK"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_empty_connection_writes_nothing() {
        let state = state(MockTransport::new());
        let out = roundtrip(&state, b"").await;
        assert!(out.is_empty());
    }
}
