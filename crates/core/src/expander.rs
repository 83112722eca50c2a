//! Optional redirect following for shortened marketplace links.
//!
//! Expansion costs a live round trip and can fail in ways the pure classifier
//! cannot, so the resolver only consults an expander when
//! `http.expand_short_links` is enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::errors::NetworkError;
use crate::gateway::http::classify_transport_error;
use crate::gateway::GatewayBuildError;

pub const MAX_REDIRECTS: usize = 10;

#[async_trait]
pub trait ShortLinkExpander: Send + Sync {
    /// Returns the URL the short link finally redirects to.
    async fn expand(&self, short_url: &str) -> Result<String, NetworkError>;
}

#[derive(Clone, Debug)]
pub struct HttpShortLinkExpander {
    client: Client,
}

impl HttpShortLinkExpander {
    pub fn new(timeout: Duration) -> Result<Self, GatewayBuildError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(GatewayBuildError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ShortLinkExpander for HttpShortLinkExpander {
    async fn expand(&self, short_url: &str) -> Result<String, NetworkError> {
        let target = if short_url.contains("://") {
            short_url.to_owned()
        } else {
            format!("https://{short_url}")
        };

        let response =
            self.client.get(&target).send().await.map_err(classify_transport_error)?;

        Ok(response.url().to_string())
    }
}
