//! Infrastructure layer with external service adapters.

/// Image decode/encode over the canonical representation.
pub mod codec;
/// Application configuration.
pub mod config;
/// Content-addressed disk cache for fetched source bytes.
pub mod disk_cache;
/// Upstream HTTP fetcher.
pub mod fetcher;
/// Segmentation backend stubs.
pub mod segmentation;

pub use config::{LogLevel, ProxyConfig, init_logging};
pub use disk_cache::{DEFAULT_MAX_ENTRIES, DiskCacheStore};
pub use fetcher::{FETCH_TIMEOUT, HttpFetcher};
pub use segmentation::DisabledSegmentation;
