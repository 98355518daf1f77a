//! Application layer: the transform pipeline and the per-request
//! orchestrator exposed to the embedding HTTP layer.

/// Content fingerprinting for conditional requests.
pub mod etag;
/// Per-request state machine.
pub mod orchestrator;
/// Ordered transform pipeline.
pub mod pipeline;
/// Response DTO written verbatim by the embedding HTTP layer.
pub mod response;
/// Process-wide observability counters.
pub mod stats;

pub use orchestrator::{ProxyRequest, RequestOrchestrator};
pub use response::{CACHE_CONTROL, CACHE_STATUS_HEADER, CacheStatus, ProxyResponse};
pub use stats::{ServiceStats, StatsSnapshot};
