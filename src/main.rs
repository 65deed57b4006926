// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # MangaDex 图片代理
//!
//! 基于 Tokio 运行时的多线程代理服务器。
//! 核心功能包括：
//! - at-home 投递元数据的解析与短期缓存
//! - 章节页面与封面图片的转发
//! - 健康检查接口
//! - 后台管理控制台（CLI 指令交互）

use mangaproxy::{
    config::Config,
    proxy::ProxyFacade,
    server::{handle_connection, ServerState},
    upstream::HttpTransport,
};

use log::{debug, error, info, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
    runtime::Builder,
    sync::watch,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process::ExitCode,
    sync::{Arc, Mutex, MutexGuard},
};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const APP_CONFIG: &str = "config/development.toml";

/// # 程序入口点
///
/// 初始化日志、加载配置、构建运行时并启动主事件循环。
fn main() -> ExitCode {
    // 1. 初始化日志系统：优先使用外部 YAML，缺失时退回到仅控制台输出
    init_logging();

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = Config::from_toml(APP_CONFIG);
    info!("配置文件已载入");

    // 3. 异步运行时定制：根据配置文件分配工作线程数
    let worker_threads = config.worker_threads();
    let runtime = match Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Tokio运行时已创建，工作线程数：{}", worker_threads);

    match runtime.block_on(serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    if log4rs::init_file(LOG_CONFIG, Default::default()).is_ok() {
        return;
    }
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}",
        )))
        .build();
    let fallback = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));
    match fallback {
        Ok(cfg) => {
            if log4rs::init_config(cfg).is_ok() {
                info!("未找到{}，日志仅输出到控制台", LOG_CONFIG);
            }
        }
        Err(e) => eprintln!("无法初始化日志系统：{}", e),
    }
}

async fn serve(config: Config) -> Result<(), String> {
    // 4. 共享资源初始化：所有连接共用一个出站连接池和一份解析缓存
    let transport = HttpTransport::from_config(&config).map_err(|e| e.to_string())?;
    let facade = Arc::new(ProxyFacade::from_config(&config, Arc::new(transport)));
    info!(
        "解析缓存有效期：{}秒，路由前缀：{}",
        config.cache_ttl().as_secs(),
        config.route_prefix()
    );

    // 5. 网络层初始化：全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let socket = SocketAddrV4::new(address, port);

    let listener = TcpListener::bind(socket)
        .await
        .map_err(|e| format!("无法绑定端口：{}，错误：{}", port, e))?;
    info!("端口{}绑定完成", port);

    let state = Arc::new(ServerState::new(Arc::clone(&facade), Arc::new(config)));

    // 6. 服务器状态与生命周期管理
    // shutdown: 停机信号，唤醒阻塞在 accept 上的主循环
    // active_connection: 当前并发连接数
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let active_connection = Arc::new(Mutex::new(0u32));

    // 7. 启动交互式管理控制台任务
    tokio::spawn({
        let active_connection = Arc::clone(&active_connection);
        let facade = Arc::clone(&facade);
        async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut input = String::new();
            loop {
                input.clear();
                match reader.read_line(&mut input).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let cmd = input.trim();
                match cmd {
                    "stop" => {
                        let _ = shutdown_tx.send(true);
                        println!("停机指令已激活，服务器将停止接收新的连接...");
                        break;
                    }
                    "help" => {
                        println!("== MangaProxy Help ==");
                        println!("stop   - 发出停机信号");
                        println!("status - 查看当前服务器运行状态");
                        println!("help   - 显示此帮助信息");
                        println!("=====================");
                    }
                    "status" => {
                        let active_count = *lock_counter(&active_connection);
                        let cache = facade.resolver().cache();
                        println!("== MangaProxy 状态 ===");
                        println!("当前活跃连接数: {}", active_count);
                        println!("解析缓存条目数: {}", cache.len());
                        println!("解析缓存有效期: {}秒", cache.ttl().as_secs());
                        println!("=====================");
                    }
                    "" => {}
                    _ => {
                        println!("无效的命令：{}", cmd);
                    }
                }
            }
        }
    });

    let mut id: u128 = 0;

    // 8. 主事件循环：持续接收新连接并将其分发至线程池
    loop {
        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("接受连接失败：{}", e);
                    continue;
                }
            },
            // 控制台因 stdin 关闭而退出时发送端被丢弃，此分支随之失效
            Ok(()) = shutdown_rx.changed() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let active_connection_arc = Arc::clone(&active_connection);
        let state_arc = Arc::clone(&state);

        tokio::spawn(async move {
            *lock_counter(&active_connection_arc) += 1;

            handle_connection(&mut stream, id, &state_arc).await;

            *lock_counter(&active_connection_arc) -= 1;
        });
        id += 1;
    }
    Ok(())
}

fn lock_counter(counter: &Mutex<u32>) -> MutexGuard<'_, u32> {
    match counter.lock() {
        Ok(lock) => lock,
        Err(poisoned) => poisoned.into_inner(),
    }
}
