//! Per-request state machine: fetch-or-hit, decode, transform, encode,
//! conditional response.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::application::response::{CacheStatus, ProxyResponse};
use crate::application::stats::{ServiceStats, StatsSnapshot};
use crate::application::{etag, pipeline};
use crate::domain::entities::{CacheKey, TransformRequest};
use crate::domain::errors::ProxyError;
use crate::domain::ports::{FetchPort, SegmentationPort};
use crate::infrastructure::codec;
use crate::infrastructure::config::ProxyConfig;
use crate::infrastructure::disk_cache::DiskCacheStore;

/// One incoming request, as handed over by the embedding HTTP layer: the
/// raw query pairs in their original order plus the conditional validator.
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    /// Query pairs in the order they appeared in the request.
    pub query: Vec<(String, String)>,
    /// `If-None-Match` header value, if the client sent one.
    pub if_none_match: Option<String>,
}

impl ProxyRequest {
    /// Creates a request from ordered query pairs and an optional
    /// conditional validator.
    #[must_use]
    pub fn new(query: Vec<(String, String)>, if_none_match: Option<String>) -> Self {
        Self {
            query,
            if_none_match,
        }
    }
}

enum Outcome {
    Served {
        body: Bytes,
        content_type: &'static str,
        etag: String,
        cache_status: CacheStatus,
    },
    NotModified {
        etag: String,
    },
}

/// Composes fetcher, cache, codec, pipeline, and ETag logic into the
/// per-request flow. This is the only type the embedding HTTP layer talks
/// to.
pub struct RequestOrchestrator {
    fetcher: Arc<dyn FetchPort>,
    cache: Arc<DiskCacheStore>,
    segmentation: Arc<dyn SegmentationPort>,
    stats: Arc<ServiceStats>,
    cpu_permits: Arc<Semaphore>,
    serve_requests: bool,
    default_image_url: String,
}

impl RequestOrchestrator {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn FetchPort>,
        cache: Arc<DiskCacheStore>,
        segmentation: Arc<dyn SegmentationPort>,
        config: &ProxyConfig,
    ) -> Self {
        Self {
            fetcher,
            cache,
            segmentation,
            stats: Arc::new(ServiceStats::new()),
            cpu_permits: Arc::new(Semaphore::new(config.max_concurrent_transforms.max(1))),
            serve_requests: config.serve_requests,
            default_image_url: config.default_image_url.clone(),
        }
    }

    /// Snapshot of the process-wide service counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Handles one request end to end. Never fails: every error becomes the
    /// corresponding JSON error response. Dropping the returned future
    /// cancels any in-flight fetch and abandons the pipeline.
    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        if !self.serve_requests {
            debug!("Service disabled, refusing request");
            return ProxyResponse::service_disabled();
        }

        let started = Instant::now();

        match self.run(&request).await {
            Ok(Outcome::Served {
                body,
                content_type,
                etag,
                cache_status,
            }) => {
                self.stats.record(body.len() as u64, started.elapsed());
                info!(
                    size = body.len(),
                    cache = cache_status.as_str(),
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Served image"
                );
                ProxyResponse::image(body, content_type, etag, cache_status)
            }
            Ok(Outcome::NotModified { etag }) => {
                debug!(etag = %etag, "Validator matched, responding not modified");
                ProxyResponse::not_modified(etag)
            }
            Err(e) => {
                // Full detail stays server-side; the response carries only
                // the sanitized message.
                if matches!(e, ProxyError::Internal { .. }) {
                    error!(error = %e, "Request failed");
                } else {
                    warn!(error = %e, "Request rejected");
                }
                ProxyResponse::error(&e)
            }
        }
    }

    async fn run(&self, request: &ProxyRequest) -> Result<Outcome, ProxyError> {
        let image_url = request
            .query
            .iter()
            .find(|(name, _)| name == "image_url")
            .map_or_else(|| self.default_image_url.clone(), |(_, value)| value.clone());

        validate_source_url(&image_url)?;

        // Validation is a separate pass from application: every parameter
        // is checked before any fetch or transform runs.
        let transforms = TransformRequest::from_query_pairs(
            request
                .query
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )?;

        // The key hashes the literal URL string, pre-transform: repeated
        // requests with different transforms share the same source entry.
        let key = CacheKey::from_url(&image_url);

        let (bytes, cache_status) = match self.cache.get(&key).await {
            Some(hit) => (hit, CacheStatus::Hit),
            None => {
                let fetched = self.fetcher.fetch(&image_url).await?;
                if let Err(e) = self.cache.put(&key, &fetched.bytes, fetched.format).await {
                    warn!(key = %key, error = %e, "Cache write failed, continuing uncached");
                }
                (fetched.bytes, CacheStatus::Miss)
            }
        };

        // Bound concurrent CPU-heavy work across requests.
        let _permit = self
            .cpu_permits
            .acquire()
            .await
            .map_err(|e| ProxyError::internal(format!("worker pool closed: {e}")))?;

        let source_url = image_url.clone();
        let decoded = task::spawn_blocking(move || codec::decode(&bytes, &source_url))
            .await
            .map_err(|e| ProxyError::internal(format!("decode task panicked: {e}")))??;

        let transformed = pipeline::apply(decoded, &transforms, &self.segmentation).await?;

        let content_type = transformed.target.content_type();
        let encoded = task::spawn_blocking(move || codec::encode(&transformed))
            .await
            .map_err(|e| ProxyError::internal(format!("encode task panicked: {e}")))??;

        let etag = etag::compute(&encoded);

        if request
            .if_none_match
            .as_deref()
            .is_some_and(|validator| etag::matches(validator, &etag))
        {
            return Ok(Outcome::NotModified { etag });
        }

        Ok(Outcome::Served {
            body: encoded,
            content_type,
            etag,
            cache_status,
        })
    }
}

/// Requires an absolute http(s) URL; anything else is a parameter error.
fn validate_source_url(image_url: &str) -> Result<(), ProxyError> {
    let parsed = Url::parse(image_url)
        .map_err(|_| ProxyError::invalid_parameter("image_url must be an absolute URL"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProxyError::invalid_parameter(
            "image_url must use the http or https scheme",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{DynamicImage, Rgb, RgbImage};
    use tempfile::TempDir;

    use crate::domain::entities::SourceFormat;
    use crate::domain::errors::FetchError;
    use crate::domain::ports::FetchedImage;
    use crate::infrastructure::segmentation::DisabledSegmentation;

    fn png_fixture() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            Rgb([u8::try_from(x % 256).unwrap(), u8::try_from(y % 256).unwrap(), 77])
        }));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    struct FakeFetcher {
        payload: Result<FetchedImage, FetchError>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn serving_png() -> Self {
            Self {
                payload: Ok(FetchedImage {
                    bytes: Bytes::from(png_fixture()),
                    format: SourceFormat::Png,
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(error: FetchError) -> Self {
            Self {
                payload: Err(error),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl FetchPort for FakeFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedImage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.payload.clone()
        }
    }

    struct Harness {
        orchestrator: RequestOrchestrator,
        fetcher: Arc<FakeFetcher>,
        cache: Arc<DiskCacheStore>,
        _temp: TempDir,
    }

    async fn harness_with(fetcher: FakeFetcher, config: ProxyConfig) -> Harness {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(
            DiskCacheStore::new(temp.path().to_path_buf(), config.max_cache_entries)
                .await
                .unwrap(),
        );
        let fetcher = Arc::new(fetcher);

        let orchestrator = RequestOrchestrator::new(
            fetcher.clone(),
            cache.clone(),
            Arc::new(DisabledSegmentation),
            &config,
        );

        Harness {
            orchestrator,
            fetcher,
            cache,
            _temp: temp,
        }
    }

    async fn harness() -> Harness {
        harness_with(FakeFetcher::serving_png(), ProxyConfig::default()).await
    }

    fn query(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    const URL: &str = "http://upstream.test/logo.png";

    #[tokio::test]
    async fn serves_transformed_image_with_etag() {
        let h = harness().await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(
                query(&[("image_url", URL), ("width", "100"), ("greyscale", "")]),
                None,
            ))
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, Some("image/png"));
        assert_eq!(response.cache_status, Some(CacheStatus::Miss));
        assert!(response.etag.is_some());

        let served = image::load_from_memory(&response.body).unwrap();
        assert_eq!(served.width(), 100);
        // Height untouched by the width operation.
        assert_eq!(served.height(), 48);
    }

    #[tokio::test]
    async fn second_identical_request_hits_the_cache_with_identical_output() {
        let h = harness().await;
        let request =
            ProxyRequest::new(query(&[("image_url", URL), ("blur", "2")]), None);

        let first = h.orchestrator.handle(request.clone()).await;
        let second = h.orchestrator.handle(request).await;

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 200);
        assert_eq!(first.body, second.body);
        assert_eq!(first.etag, second.etag);
        assert_eq!(first.cache_status, Some(CacheStatus::Miss));
        assert_eq!(second.cache_status, Some(CacheStatus::Hit));
        assert_eq!(h.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn matching_validator_returns_304_with_empty_body() {
        let h = harness().await;
        let pairs = query(&[("image_url", URL), ("flip", "")]);

        let first = h
            .orchestrator
            .handle(ProxyRequest::new(pairs.clone(), None))
            .await;
        let etag = first.etag.clone().unwrap();

        let second = h
            .orchestrator
            .handle(ProxyRequest::new(pairs, Some(etag.clone())))
            .await;

        assert_eq!(second.status, 304);
        assert!(second.body.is_empty());
        assert_eq!(second.etag, Some(etag));
    }

    #[tokio::test]
    async fn invalid_width_is_rejected_before_any_fetch() {
        let h = harness().await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(
                query(&[("image_url", URL), ("width", "abc")]),
                None,
            ))
            .await;

        assert_eq!(response.status, 400);
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed["status"], "error");
        assert_eq!(h.fetcher.calls(), 0);
        assert!(h.cache.is_empty().await);
    }

    #[tokio::test]
    async fn missing_scheme_is_an_invalid_parameter() {
        let h = harness().await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(
                query(&[("image_url", "upstream.test/logo.png")]),
                None,
            ))
            .await;

        assert_eq!(response.status, 400);
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_400_and_no_cache_entry() {
        let h = harness_with(
            FakeFetcher::failing(FetchError::UpstreamUnreachable {
                cause: "connection refused".to_owned(),
            }),
            ProxyConfig::default(),
        )
        .await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(query(&[("image_url", URL)]), None))
            .await;

        assert_eq!(response.status, 400);
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(parsed["status"], "error");
        assert!(h.cache.is_empty().await);
    }

    #[tokio::test]
    async fn unsupported_content_type_is_rejected_without_caching() {
        let h = harness_with(
            FakeFetcher::failing(FetchError::UnsupportedContentType {
                subtype: "svg+xml".to_owned(),
            }),
            ProxyConfig::default(),
        )
        .await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(query(&[("image_url", URL)]), None))
            .await;

        assert_eq!(response.status, 400);
        assert!(h.cache.is_empty().await);
    }

    #[tokio::test]
    async fn kill_switch_short_circuits_before_fetching() {
        let config = ProxyConfig {
            serve_requests: false,
            ..ProxyConfig::default()
        };
        let h = harness_with(FakeFetcher::serving_png(), config).await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(query(&[("image_url", URL)]), None))
            .await;

        assert_eq!(response.status, 503);
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn missing_image_url_falls_back_to_the_configured_default() {
        let config = ProxyConfig {
            default_image_url: URL.to_owned(),
            ..ProxyConfig::default()
        };
        let h = harness_with(FakeFetcher::serving_png(), config).await;

        let response = h.orchestrator.handle(ProxyRequest::new(query(&[]), None)).await;

        assert_eq!(response.status, 200);
        assert_eq!(h.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn quality_request_is_served_as_jpeg() {
        let h = harness().await;

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(
                query(&[("image_url", URL), ("quality", "40")]),
                None,
            ))
            .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, Some("image/jpeg"));
        assert_eq!(&response.body[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn stats_count_served_requests_but_not_304s() {
        let h = harness().await;
        let pairs = query(&[("image_url", URL)]);

        let first = h
            .orchestrator
            .handle(ProxyRequest::new(pairs.clone(), None))
            .await;
        let etag = first.etag.clone().unwrap();
        let _not_modified = h
            .orchestrator
            .handle(ProxyRequest::new(pairs, Some(etag)))
            .await;

        let snapshot = h.orchestrator.stats();
        assert_eq!(snapshot.images_processed, 1);
        assert_eq!(snapshot.bytes_served, first.body.len() as u64);
    }

    #[tokio::test]
    async fn corrupt_cached_bytes_surface_as_unsupported_format() {
        let h = harness().await;
        let key = CacheKey::from_url(URL);
        h.cache.put(&key, b"not an image", SourceFormat::Png).await.unwrap();

        let response = h
            .orchestrator
            .handle(ProxyRequest::new(query(&[("image_url", URL)]), None))
            .await;

        assert_eq!(response.status, 400);
        let parsed: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(
            parsed["message"],
            "The requested image was not in a supported format."
        );
    }
}
