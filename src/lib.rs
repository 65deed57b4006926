// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod at_home;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod exception;
pub mod fetcher;
pub mod health;
pub mod param;
pub mod proxy;
pub mod request;
pub mod resolver;
pub mod response;
pub mod router;
pub mod server;
pub mod upstream;
pub mod util;

pub use cache::ResolutionCache;
pub use config::Config;
pub use delivery::ResolvedDelivery;
pub use exception::Exception;
pub use fetcher::ImageFetcher;
pub use param::{HttpRequestMethod, HttpVersion};
pub use proxy::{ProxyError, ProxyFacade};
pub use request::Request;
pub use resolver::Resolver;
pub use response::Response;
pub use router::{route, Route};
pub use server::{handle_connection, ServerState};
pub use upstream::{HttpTransport, Transport, UpstreamClient};
