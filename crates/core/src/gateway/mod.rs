//! Remote link service client.
//!
//! [`LinkGateway`] is the seam between the resolver and the affiliate API:
//! [`http::HttpLinkGateway`] talks to the real gateway, tests script their own.
//! Transport problems surface as [`NetworkError`]; what the gateway *said* is
//! interpreted separately by [`response::parse_response`].

pub mod http;
pub mod response;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::errors::NetworkError;
use crate::signing::SignMethod;

pub use http::{GatewayBuildError, HttpLinkGateway};
pub use response::parse_response;

pub const LINK_GENERATE_METHOD: &str = "aliexpress.affiliate.link.generate";
pub const API_VERSION: &str = "2.0";
pub const RESPONSE_FORMAT: &str = "json";

/// Decoded JSON body of a gateway reply, not yet interpreted.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse(Value);

impl RawResponse {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn body(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[async_trait]
pub trait LinkGateway: Send + Sync {
    async fn request_affiliate_link(&self, source_url: &str) -> Result<RawResponse, NetworkError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromotionLinkType {
    #[default]
    Product,
    Search,
}

impl PromotionLinkType {
    pub fn wire_value(&self) -> &'static str {
        match self {
            Self::Product => "1",
            Self::Search => "0",
        }
    }
}

/// The per-deployment part of a link generation request; only the source URL
/// and timestamp change between calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkRequestTemplate {
    pub app_key: String,
    pub tracking_id: String,
    pub target_currency: Option<String>,
    pub target_language: Option<String>,
    pub sign_method: SignMethod,
    pub promotion_link_type: PromotionLinkType,
}

impl LinkRequestTemplate {
    pub fn from_config(marketplace: &MarketplaceConfig) -> Self {
        Self {
            app_key: marketplace.app_key.clone(),
            tracking_id: marketplace.tracking_id.clone(),
            target_currency: non_empty(&marketplace.target_currency),
            target_language: non_empty(&marketplace.target_language),
            sign_method: marketplace.sign_method,
            promotion_link_type: PromotionLinkType::default(),
        }
    }

    /// Unsigned parameters for one call.
    pub fn params(&self, source_url: &str, timestamp_millis: i64) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("app_key".to_owned(), self.app_key.clone());
        params.insert("timestamp".to_owned(), timestamp_millis.to_string());
        params.insert("sign_method".to_owned(), self.sign_method.wire_name().to_owned());
        params.insert("format".to_owned(), RESPONSE_FORMAT.to_owned());
        params.insert("v".to_owned(), API_VERSION.to_owned());
        params.insert("method".to_owned(), LINK_GENERATE_METHOD.to_owned());
        params.insert(
            "promotion_link_type".to_owned(),
            self.promotion_link_type.wire_value().to_owned(),
        );
        params.insert("tracking_id".to_owned(), self.tracking_id.clone());
        params.insert("source_values".to_owned(), source_url.to_owned());

        if let Some(currency) = &self.target_currency {
            params.insert("target_currency".to_owned(), currency.clone());
        }
        if let Some(language) = &self.target_language {
            params.insert("target_language".to_owned(), language.clone());
        }

        params
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{LinkRequestTemplate, PromotionLinkType, LINK_GENERATE_METHOD};
    use crate::config::AppConfig;
    use crate::signing::SignMethod;

    fn template() -> LinkRequestTemplate {
        LinkRequestTemplate {
            app_key: "500123".to_owned(),
            tracking_id: "my_tracking".to_owned(),
            target_currency: Some("USD".to_owned()),
            target_language: Some("en".to_owned()),
            sign_method: SignMethod::HmacSha256,
            promotion_link_type: PromotionLinkType::Product,
        }
    }

    #[test]
    fn params_carry_every_required_field() {
        let params =
            template().params("https://www.aliexpress.com/item/1005001234567890.html", 1_700_000_000_000);

        assert_eq!(params.get("app_key").map(String::as_str), Some("500123"));
        assert_eq!(params.get("timestamp").map(String::as_str), Some("1700000000000"));
        assert_eq!(params.get("sign_method").map(String::as_str), Some("sha256"));
        assert_eq!(params.get("format").map(String::as_str), Some("json"));
        assert_eq!(params.get("v").map(String::as_str), Some("2.0"));
        assert_eq!(params.get("method").map(String::as_str), Some(LINK_GENERATE_METHOD));
        assert_eq!(params.get("promotion_link_type").map(String::as_str), Some("1"));
        assert_eq!(params.get("tracking_id").map(String::as_str), Some("my_tracking"));
        assert_eq!(params.get("target_currency").map(String::as_str), Some("USD"));
        assert_eq!(params.get("target_language").map(String::as_str), Some("en"));
        assert_eq!(
            params.get("source_values").map(String::as_str),
            Some("https://www.aliexpress.com/item/1005001234567890.html")
        );
        assert!(!params.contains_key("sign"));
    }

    #[test]
    fn optional_targets_are_omitted_when_unset() {
        let template = LinkRequestTemplate {
            target_currency: None,
            target_language: None,
            promotion_link_type: PromotionLinkType::Search,
            ..template()
        };
        let params = template.params("https://www.aliexpress.com/item/1.html", 1);

        assert!(!params.contains_key("target_currency"));
        assert!(!params.contains_key("target_language"));
        assert_eq!(params.get("promotion_link_type").map(String::as_str), Some("0"));
    }

    #[test]
    fn template_reads_marketplace_config() {
        let mut config = AppConfig::default();
        config.marketplace.app_key = "key".to_owned();
        config.marketplace.tracking_id = "tracker".to_owned();
        config.marketplace.target_language = " ".to_owned();
        config.marketplace.sign_method = SignMethod::Md5;

        let template = LinkRequestTemplate::from_config(&config.marketplace);

        assert_eq!(template.app_key, "key");
        assert_eq!(template.tracking_id, "tracker");
        assert_eq!(template.target_currency.as_deref(), Some("USD"));
        assert_eq!(template.target_language, None);
        assert_eq!(template.sign_method, SignMethod::Md5);
    }
}
