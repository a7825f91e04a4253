//! CLI command implementations.

pub mod build;
pub mod manifest;
pub mod map_config;
pub mod proxy;

pub use build::build_transcripts;
pub use manifest::{list_routes, show_manifest};
pub use map_config::map_config;
pub use proxy::{proxy_server, ProxyOverrides};
