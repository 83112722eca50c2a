use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::cache::ResolutionCache;
use crate::classifier::UrlClassifier;
use crate::config::{AppConfig, DEFAULT_PRODUCT_BASE_URL};
use crate::domain::outcome::Outcome;
use crate::domain::product::ProductId;
use crate::errors::{RemoteFailure, ResolutionError};
use crate::expander::{HttpShortLinkExpander, ShortLinkExpander};
use crate::gateway::{parse_response, GatewayBuildError, HttpLinkGateway, LinkGateway};

const LOG_URL_LIMIT: usize = 100;

/// Turns user-supplied text into an affiliate link.
///
/// A resolver is cheap to share behind an `Arc`; every call to
/// [`Resolver::resolve`] is independent apart from the injected cache.
pub struct Resolver {
    classifier: UrlClassifier,
    gateway: Arc<dyn LinkGateway>,
    cache: Arc<ResolutionCache>,
    tracking_id: String,
    product_base_url: String,
    expander: Option<Arc<dyn ShortLinkExpander>>,
}

impl Resolver {
    pub fn new(
        gateway: Arc<dyn LinkGateway>,
        cache: Arc<ResolutionCache>,
        tracking_id: impl Into<String>,
    ) -> Self {
        Self {
            classifier: UrlClassifier::default(),
            gateway,
            cache,
            tracking_id: tracking_id.into(),
            product_base_url: DEFAULT_PRODUCT_BASE_URL.to_owned(),
            expander: None,
        }
    }

    /// Wires the HTTP gateway, and the short-link expander when enabled.
    pub fn from_config(
        config: &AppConfig,
        cache: Arc<ResolutionCache>,
    ) -> Result<Self, GatewayBuildError> {
        let gateway = Arc::new(HttpLinkGateway::from_config(config)?);
        let mut resolver = Self::new(gateway, cache, config.marketplace.tracking_id.clone())
            .with_classifier(UrlClassifier::new(config.marketplace.site_host.clone()))
            .with_product_base_url(config.marketplace.product_base_url.clone());

        if config.http.expand_short_links {
            let expander = HttpShortLinkExpander::new(config.http.timeout())?;
            resolver = resolver.with_expander(Arc::new(expander));
        }
        Ok(resolver)
    }

    pub fn with_classifier(mut self, classifier: UrlClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_product_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.product_base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_expander(mut self, expander: Arc<dyn ShortLinkExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn is_supported_url(&self, text: &str) -> bool {
        self.classifier.is_supported_url(text)
    }

    /// Resolves one message. Never fails outright: every path ends in an [`Outcome`].
    ///
    /// Only [`Outcome::Success`] is cached, and only after the gateway call
    /// completed, so dropping this future mid-call leaves the cache untouched.
    pub async fn resolve(&self, raw_text: &str) -> Outcome {
        let url = raw_text.trim();
        let correlation_id = Uuid::new_v4();
        let log_url = truncate_for_log(url);

        if !self.classifier.is_supported_url(url) {
            info!(
                event_name = "engine.resolve.rejected",
                correlation_id = %correlation_id,
                url = %log_url,
                "input is not a supported marketplace link"
            );
            return Outcome::Failure(ResolutionError::InvalidUrl);
        }

        if let Some(link) = self.cache.get(url) {
            debug!(
                event_name = "engine.resolve.cache_hit",
                correlation_id = %correlation_id,
                url = %log_url,
                "serving affiliate link from cache"
            );
            return Outcome::Success(link);
        }

        debug!(
            event_name = "engine.resolve.cache_miss",
            correlation_id = %correlation_id,
            url = %log_url,
            "requesting affiliate link from gateway"
        );

        let failure = match self.gateway.request_affiliate_link(url).await {
            Ok(raw) => match parse_response(&raw) {
                Outcome::Success(link) => {
                    self.cache.set(url, link.clone());
                    info!(
                        event_name = "engine.resolve.success",
                        correlation_id = %correlation_id,
                        url = %log_url,
                        "affiliate link generated"
                    );
                    return Outcome::Success(link);
                }
                Outcome::Failure(ResolutionError::Remote(failure)) => failure,
                other => return other,
            },
            Err(error) => RemoteFailure::Network(error),
        };

        warn!(
            event_name = "engine.resolve.remote_failed",
            correlation_id = %correlation_id,
            url = %log_url,
            error = %failure,
            transient = failure.is_transient(),
            "affiliate gateway failed; trying fallback link"
        );

        self.fallback(url, failure, correlation_id).await
    }

    /// Purchase link built locally from a product id; attribution is best effort.
    pub fn fallback_link(&self, product_id: &ProductId) -> String {
        let base = format!("{}/item/{}.html", self.product_base_url, product_id);
        match Url::parse(&base) {
            Ok(mut link) => {
                link.query_pairs_mut()
                    .append_pair("aff_fcid", &self.tracking_id)
                    .append_pair("aff_platform", "default");
                link.into()
            }
            Err(_) => format!("{base}?aff_fcid={}&aff_platform=default", self.tracking_id),
        }
    }

    async fn fallback(&self, url: &str, cause: RemoteFailure, correlation_id: Uuid) -> Outcome {
        let product_id = match self.classifier.extract_product_id(url) {
            Some(product_id) => Some(product_id),
            None => self.expand_and_extract(url, correlation_id).await,
        };

        match product_id {
            Some(product_id) => {
                info!(
                    event_name = "engine.resolve.fallback",
                    correlation_id = %correlation_id,
                    product_id = %product_id,
                    "returning fallback purchase link"
                );
                Outcome::FallbackSuccess(self.fallback_link(&product_id))
            }
            None => {
                warn!(
                    event_name = "engine.resolve.unresolvable",
                    correlation_id = %correlation_id,
                    url = %truncate_for_log(url),
                    "no product id available for fallback link"
                );
                Outcome::Failure(ResolutionError::Unresolvable { cause })
            }
        }
    }

    async fn expand_and_extract(&self, url: &str, correlation_id: Uuid) -> Option<ProductId> {
        let expander = self.expander.as_ref()?;
        if !self.classifier.is_short_link(url) {
            return None;
        }

        match expander.expand(url).await {
            Ok(expanded) => {
                debug!(
                    event_name = "engine.resolve.short_link_expanded",
                    correlation_id = %correlation_id,
                    expanded = %truncate_for_log(&expanded),
                    "followed short link redirects"
                );
                self.classifier.extract_product_id(&expanded)
            }
            Err(error) => {
                warn!(
                    event_name = "engine.resolve.short_link_expansion_failed",
                    correlation_id = %correlation_id,
                    error = %error,
                    "could not expand short link"
                );
                None
            }
        }
    }
}

fn truncate_for_log(url: &str) -> &str {
    match url.char_indices().nth(LOG_URL_LIMIT) {
        Some((index, _)) => &url[..index],
        None => url,
    }
}
