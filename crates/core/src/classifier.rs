use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::product::ProductId;

pub const DEFAULT_SITE_HOST: &str = "aliexpress.com";

const DEFAULT_SHORTENER_PATTERNS: [&str; 3] =
    ["a.aliexpress.com", "s.click.aliexpress.com", "aliexpress.com/_"];

static PRODUCT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:item|i)/(\d+)\.html").expect("invalid product path regex"));

/// Decides whether text is a marketplace link and recovers product ids from it.
///
/// Every check here is purely syntactic. Shortened links need a network round
/// trip to reveal their product, which lives in [`crate::expander`] instead.
#[derive(Clone, Debug)]
pub struct UrlClassifier {
    site_host: String,
    shortener_patterns: Vec<String>,
}

impl Default for UrlClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_HOST)
    }
}

impl UrlClassifier {
    pub fn new(site_host: impl Into<String>) -> Self {
        let site_host = site_host.into().trim().to_ascii_lowercase();
        let shortener_patterns = if site_host == DEFAULT_SITE_HOST {
            DEFAULT_SHORTENER_PATTERNS.iter().map(|pattern| (*pattern).to_owned()).collect()
        } else {
            vec![format!("a.{site_host}"), format!("s.click.{site_host}"), format!("{site_host}/_")]
        };
        Self { site_host, shortener_patterns }
    }

    pub fn site_host(&self) -> &str {
        &self.site_host
    }

    /// Substring containment only; the gateway itself accepts any URL on the host.
    pub fn is_supported_url(&self, text: &str) -> bool {
        text.trim().to_ascii_lowercase().contains(&self.site_host)
    }

    /// Host patterns must equal the URL host; patterns with a path match as substrings.
    pub fn is_short_link(&self, url: &str) -> bool {
        let lowered = url.trim().to_ascii_lowercase();
        let host = parse_lenient(&lowered).and_then(|parsed| parsed.host_str().map(str::to_owned));

        self.shortener_patterns.iter().any(|pattern| {
            if pattern.contains('/') {
                lowered.contains(pattern.as_str())
            } else {
                host.as_deref() == Some(pattern.as_str())
            }
        })
    }

    /// Recovers the product id, trying in order: shortener rejection,
    /// `/item/<id>.html` or `/i/<id>.html`, then any long all-digit path segment.
    pub fn extract_product_id(&self, url: &str) -> Option<ProductId> {
        let url = url.trim();
        if self.is_short_link(url) {
            return None;
        }

        product_path_id(url).or_else(|| path_segment_id(url))
    }
}

fn product_path_id(url: &str) -> Option<ProductId> {
    PRODUCT_PATH
        .captures_iter(url)
        .filter_map(|captures| captures.get(1))
        .find_map(|digits| ProductId::parse(digits.as_str()))
}

fn path_segment_id(url: &str) -> Option<ProductId> {
    let parsed = parse_lenient(url)?;
    let mut segments = parsed.path_segments()?;
    segments.find_map(ProductId::parse)
}

/// Chat users often paste links without a scheme.
fn parse_lenient(url: &str) -> Option<Url> {
    Url::parse(url).or_else(|_| Url::parse(&format!("https://{url}"))).ok()
}

#[cfg(test)]
mod tests {
    use super::UrlClassifier;

    fn classifier() -> UrlClassifier {
        UrlClassifier::default()
    }

    fn extracted(url: &str) -> Option<String> {
        classifier().extract_product_id(url).map(String::from)
    }

    #[test]
    fn supported_urls_match_host_case_insensitively() {
        let classifier = classifier();

        assert!(classifier.is_supported_url("https://www.aliexpress.com/item/1005001234567890.html"));
        assert!(classifier.is_supported_url("  HTTPS://WWW.AliExpress.COM/item/1.html  "));
        assert!(classifier.is_supported_url("https://a.aliexpress.com/_mKp0abc"));
        assert!(!classifier.is_supported_url("https://www.amazon.com/dp/B000000000"));
        assert!(!classifier.is_supported_url(""));
    }

    #[test]
    fn extracts_id_from_item_path() {
        assert_eq!(
            extracted("https://www.aliexpress.com/item/1005001234567890.html").as_deref(),
            Some("1005001234567890")
        );
        let tracked =
            "https://www.aliexpress.com/item/1005001234567890.html?spm=a2g0o&gatewayAdapt=glo2usa";
        assert_eq!(extracted(tracked).as_deref(), Some("1005001234567890"));
    }

    #[test]
    fn extracts_id_from_mobile_path() {
        assert_eq!(
            extracted("https://m.aliexpress.com/i/1005006543210987.html").as_deref(),
            Some("1005006543210987")
        );
    }

    #[test]
    fn rejects_short_numeric_item_ids() {
        assert_eq!(extracted("https://www.aliexpress.com/item/12345.html"), None);
        assert_eq!(extracted("https://www.aliexpress.com/item/1234567890.html"), None);
    }

    #[test]
    fn shortener_links_never_yield_an_id() {
        let classifier = classifier();

        assert!(classifier.is_short_link("https://a.aliexpress.com/_mKp0abc"));
        assert!(classifier.is_short_link("https://s.click.aliexpress.com/e/_DlQ1234"));
        assert!(classifier.is_short_link("https://aliexpress.com/_mABCDEF"));
        assert_eq!(extracted("https://a.aliexpress.com/_mKp0abc"), None);
        assert_eq!(extracted("https://s.click.aliexpress.com/e/10050012345678901"), None);
    }

    #[test]
    fn regional_hosts_are_not_mistaken_for_shorteners() {
        let classifier = classifier();

        assert!(!classifier.is_short_link("https://ja.aliexpress.com/item/1005001234567890.html"));
        assert_eq!(
            extracted("https://ja.aliexpress.com/item/1005001234567890.html").as_deref(),
            Some("1005001234567890")
        );
    }

    #[test]
    fn falls_back_to_any_long_digit_segment() {
        assert_eq!(
            extracted("https://www.aliexpress.com/store/product/1005001234567890").as_deref(),
            Some("1005001234567890")
        );
        assert_eq!(
            extracted("www.aliexpress.us/gcp/300000512/1005001234567890?x=1").as_deref(),
            Some("1005001234567890")
        );
        assert_eq!(extracted("https://www.aliexpress.com/store/1234567"), None);
    }

    #[test]
    fn query_string_digits_are_not_product_ids() {
        assert_eq!(extracted("https://www.aliexpress.com/w/wholesale.html?id=1005001234567890"), None);
    }

    #[test]
    fn custom_host_derives_shortener_patterns() {
        let classifier = UrlClassifier::new("Example.COM");

        assert_eq!(classifier.site_host(), "example.com");
        assert!(classifier.is_supported_url("https://shop.example.com/item/1005001234567890.html"));
        assert!(classifier.is_short_link("https://a.example.com/_xyz"));
        assert_eq!(
            classifier
                .extract_product_id("https://shop.example.com/item/1005001234567890.html")
                .map(String::from)
                .as_deref(),
            Some("1005001234567890")
        );
    }
}
