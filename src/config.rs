// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs;
use std::time::Duration;

use crate::exception::Exception;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_route_prefix")]
    route_prefix: String,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_cover_base_url")]
    cover_base_url: String,
    #[serde(default = "default_referer")]
    referer: String,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_cache_ttl_secs")]
    cache_ttl_secs: u64,
    #[serde(default = "default_metadata_timeout_secs")]
    metadata_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    fetch_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
    #[serde(default = "default_max_request_bytes")]
    max_request_bytes: usize,
    /// 客户端发完请求头的最长时间
    #[serde(default = "default_read_timeout_secs")]
    read_timeout_secs: u64,
    /// 是否遵循 HTTP(S)_PROXY 等环境变量
    #[serde(default = "default_use_system_proxy")]
    use_system_proxy: bool,
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_route_prefix() -> String {
    "/proxy/mangadex".to_string()
}

fn default_api_base_url() -> String {
    "https://api.mangadex.org".to_string()
}

fn default_cover_base_url() -> String {
    "https://uploads.mangadex.org/covers".to_string()
}

fn default_referer() -> String {
    "https://mangadex.org/".to_string()
}

fn default_user_agent() -> String {
    concat!("mangaproxy/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_cache_ttl_secs() -> u64 {
    180 // 3分钟
}

fn default_metadata_timeout_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_request_bytes() -> usize {
    8192 // 8KB
}

fn default_read_timeout_secs() -> u64 {
    15
}

fn default_use_system_proxy() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            local: default_local(),
            worker_threads: 0,
            route_prefix: default_route_prefix(),
            api_base_url: default_api_base_url(),
            cover_base_url: default_cover_base_url(),
            referer: default_referer(),
            user_agent: default_user_agent(),
            cache_ttl_secs: default_cache_ttl_secs(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_request_bytes: default_max_request_bytes(),
            read_timeout_secs: default_read_timeout_secs(),
            use_system_proxy: default_use_system_proxy(),
        }
    }

    /// 从 TOML 字符串解析配置，并修正不合理的取值
    pub fn from_toml_str(text: &str) -> Result<Self, Exception> {
        let raw_config: Config =
            toml::from_str(text).map_err(|e| Exception::Config(e.to_string()))?;
        Ok(raw_config.normalized())
    }

    /// 读取配置文件。文件不存在或格式错误时使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        let str_val = match fs::read_to_string(filename) {
            Ok(s) => s,
            Err(e) => {
                warn!("无法读取配置文件{}：{}，使用默认配置", filename, e);
                return Config::new().normalized();
            }
        };

        match Config::from_toml_str(&str_val) {
            Ok(config) => config,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象（{}），使用默认配置", e);
                Config::new().normalized()
            }
        }
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_ttl_secs == 0 {
            warn!("cache_ttl_secs被设置为0，但解析缓存不能被禁用，因此该值将被改为{}。", default_cache_ttl_secs());
            self.cache_ttl_secs = default_cache_ttl_secs();
        }
        if self.metadata_timeout_secs == 0 {
            warn!("metadata_timeout_secs不能为0，使用默认值{}", default_metadata_timeout_secs());
            self.metadata_timeout_secs = default_metadata_timeout_secs();
        }
        if self.fetch_timeout_secs == 0 {
            warn!("fetch_timeout_secs不能为0，使用默认值{}", default_fetch_timeout_secs());
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if self.connect_timeout_secs == 0 {
            warn!("connect_timeout_secs不能为0，使用默认值{}", default_connect_timeout_secs());
            self.connect_timeout_secs = default_connect_timeout_secs();
        }
        if self.read_timeout_secs == 0 {
            warn!("read_timeout_secs不能为0，使用默认值{}", default_read_timeout_secs());
            self.read_timeout_secs = default_read_timeout_secs();
        }
        if self.max_request_bytes < 1024 {
            warn!("max_request_bytes过小，使用默认值{}", default_max_request_bytes());
            self.max_request_bytes = default_max_request_bytes();
        }
        // 统一去掉末尾的'/'，拼接URL时再补上
        trim_trailing_slash(&mut self.route_prefix);
        trim_trailing_slash(&mut self.api_base_url);
        trim_trailing_slash(&mut self.cover_base_url);
        self
    }
}

fn trim_trailing_slash(s: &mut String) {
    while s.ends_with('/') {
        s.pop();
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn route_prefix(&self) -> &str {
        &self.route_prefix
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn cover_base_url(&self) -> &str {
        &self.cover_base_url
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn use_system_proxy(&self) -> bool {
        self.use_system_proxy
    }
}

impl Config {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.api_base_url = url.to_string();
        trim_trailing_slash(&mut self.api_base_url);
        self
    }

    pub fn with_cover_base_url(mut self, url: &str) -> Self {
        self.cover_base_url = url.to_string();
        trim_trailing_slash(&mut self.cover_base_url);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs().max(1);
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }
}
