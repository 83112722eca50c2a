use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::{LinkGateway, LinkRequestTemplate, RawResponse};
use crate::config::AppConfig;
use crate::errors::NetworkError;
use crate::signing::{RequestSigner, SignedRequest, SigningError};

#[derive(Debug, Error)]
pub enum GatewayBuildError {
    #[error("failed to build affiliate gateway HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// [`LinkGateway`] backed by the marketplace REST gateway.
#[derive(Clone, Debug)]
pub struct HttpLinkGateway {
    client: Client,
    gateway_url: String,
    template: LinkRequestTemplate,
    signer: RequestSigner,
}

impl HttpLinkGateway {
    pub fn new(
        gateway_url: impl Into<String>,
        template: LinkRequestTemplate,
        signer: RequestSigner,
        timeout: Duration,
    ) -> Result<Self, GatewayBuildError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(GatewayBuildError::ClientBuild)?;

        Ok(Self { client, gateway_url: gateway_url.into(), template, signer })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GatewayBuildError> {
        let marketplace = &config.marketplace;
        Self::new(
            marketplace.gateway_url.clone(),
            LinkRequestTemplate::from_config(marketplace),
            RequestSigner::new(marketplace.app_secret.clone(), marketplace.sign_method),
            config.http.timeout(),
        )
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    /// Builds the exact parameter set sent for `source_url` at `timestamp_millis`.
    pub fn build_signed_request(
        &self,
        source_url: &str,
        timestamp_millis: i64,
    ) -> Result<SignedRequest, SigningError> {
        self.signer.sign_request(self.template.params(source_url, timestamp_millis))
    }

    async fn send(&self, params: &BTreeMap<String, String>) -> Result<Value, NetworkError> {
        let response = self
            .client
            .get(&self.gateway_url)
            .query(params)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Unexpected(format!("gateway returned HTTP {status}")));
        }

        response.json::<Value>().await.map_err(|error| {
            if error.is_timeout() {
                NetworkError::Timeout
            } else {
                NetworkError::Unexpected(format!("failed to decode gateway response: {error}"))
            }
        })
    }
}

#[async_trait]
impl LinkGateway for HttpLinkGateway {
    async fn request_affiliate_link(&self, source_url: &str) -> Result<RawResponse, NetworkError> {
        let timestamp_millis = Utc::now().timestamp_millis();
        let request = self
            .build_signed_request(source_url, timestamp_millis)
            .map_err(|error| NetworkError::Unexpected(error.to_string()))?;

        debug!(
            event_name = "engine.gateway.request_sent",
            sign_method = %self.signer.method(),
            timestamp_millis,
            "sending affiliate link generation request"
        );

        match self.send(request.params()).await {
            Ok(body) => {
                debug!(event_name = "engine.gateway.response_received", "affiliate gateway responded");
                Ok(RawResponse::new(body))
            }
            Err(error) => {
                warn!(
                    event_name = "engine.gateway.request_failed",
                    error = %error,
                    "affiliate gateway call failed"
                );
                Err(error)
            }
        }
    }
}

pub(crate) fn classify_transport_error(error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout
    } else if error.is_connect() {
        NetworkError::ConnectionFailed(error.to_string())
    } else {
        NetworkError::Unexpected(error.to_string())
    }
}
