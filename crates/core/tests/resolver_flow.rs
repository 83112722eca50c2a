use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use affilink_core::errors::{NetworkError, RemoteFailure, ResolutionError};
use affilink_core::{
    LinkGateway, Outcome, RawResponse, ResolutionCache, Resolver, ShortLinkExpander,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

const ITEM_URL: &str = "https://www.aliexpress.com/item/1005001234567890.html";
const SHORT_URL: &str = "https://a.aliexpress.com/_mKp0abc";
const PROMOTION_LINK: &str = "https://s.click.aliexpress.com/e/_DmAbCdE";

type Reply = Result<RawResponse, NetworkError>;

struct ScriptedGateway {
    state: Mutex<ScriptedState>,
}

#[derive(Default)]
struct ScriptedState {
    replies: VecDeque<Reply>,
    requests: Vec<String>,
}

impl ScriptedGateway {
    fn with_script(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ScriptedState { replies: replies.into(), requests: Vec::new() }),
        })
    }

    /// Answers every call with the same successful link.
    fn always_ok() -> Arc<Self> {
        Self::with_script(Vec::new())
    }

    async fn requests(&self) -> Vec<String> {
        self.state.lock().await.requests.clone()
    }
}

#[async_trait]
impl LinkGateway for ScriptedGateway {
    async fn request_affiliate_link(&self, source_url: &str) -> Reply {
        let mut state = self.state.lock().await;
        state.requests.push(source_url.to_owned());
        state.replies.pop_front().unwrap_or_else(|| Ok(success_body(PROMOTION_LINK)))
    }
}

/// Never answers; stands in for a call the caller gives up on.
struct HangingGateway;

#[async_trait]
impl LinkGateway for HangingGateway {
    async fn request_affiliate_link(&self, _: &str) -> Reply {
        std::future::pending().await
    }
}

struct ScriptedExpander {
    result: Result<String, NetworkError>,
    calls: Mutex<usize>,
}

#[async_trait]
impl ShortLinkExpander for ScriptedExpander {
    async fn expand(&self, _: &str) -> Result<String, NetworkError> {
        *self.calls.lock().await += 1;
        self.result.clone()
    }
}

fn success_body(link: &str) -> RawResponse {
    RawResponse::new(json!({
        "aliexpress_affiliate_link_generate_response": {
            "resp_result": {
                "resp_code": 200,
                "resp_msg": "success",
                "result": {
                    "promotion_links": {
                        "promotion_link": [{ "promotion_link": link, "source_value": ITEM_URL }]
                    }
                }
            }
        }
    }))
}

fn rejection_body(code: &str, message: &str) -> RawResponse {
    RawResponse::new(json!({
        "aliexpress_affiliate_link_generate_response": {
            "resp_result": { "resp_code": code, "resp_msg": message }
        }
    }))
}

fn resolver(gateway: Arc<dyn LinkGateway>, cache: Arc<ResolutionCache>) -> Resolver {
    Resolver::new(gateway, cache, "my_tracking")
}

#[tokio::test]
async fn unsupported_text_is_rejected_without_remote_call() {
    let gateway = ScriptedGateway::always_ok();
    let resolver = resolver(gateway.clone(), Arc::new(ResolutionCache::default()));

    for text in ["https://www.amazon.com/dp/B000000000", "hello there", ""] {
        assert_eq!(resolver.resolve(text).await, Outcome::Failure(ResolutionError::InvalidUrl));
    }
    assert!(gateway.requests().await.is_empty());
}

#[tokio::test]
async fn repeated_resolution_within_ttl_hits_the_cache() {
    let gateway = ScriptedGateway::always_ok();
    let cache = Arc::new(ResolutionCache::default());
    let resolver = resolver(gateway.clone(), Arc::clone(&cache));

    let first = resolver.resolve(ITEM_URL).await;
    let second = resolver.resolve(&format!("  {ITEM_URL}\n")).await;

    assert_eq!(first, Outcome::Success(PROMOTION_LINK.to_owned()));
    assert_eq!(first, second);
    assert_eq!(gateway.requests().await, vec![ITEM_URL.to_owned()]);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn unbounded_cache_ttl_still_resolves() {
    let gateway = ScriptedGateway::always_ok();
    let cache = Arc::new(ResolutionCache::new(Duration::from_secs(u64::MAX)));
    let resolver = resolver(gateway.clone(), Arc::clone(&cache));

    assert_eq!(resolver.resolve(ITEM_URL).await, Outcome::Success(PROMOTION_LINK.to_owned()));
    assert_eq!(resolver.resolve(ITEM_URL).await, Outcome::Success(PROMOTION_LINK.to_owned()));
    assert_eq!(gateway.requests().await.len(), 1, "second call should be served from the cache");
}

#[tokio::test(start_paused = true)]
async fn expired_entries_trigger_a_new_remote_call() {
    let gateway = ScriptedGateway::with_script(vec![
        Ok(success_body("https://s.click.aliexpress.com/e/_first")),
        Ok(success_body("https://s.click.aliexpress.com/e/_second")),
    ]);
    let cache = Arc::new(ResolutionCache::new(Duration::from_secs(60)));
    let resolver = resolver(gateway.clone(), cache);

    assert_eq!(
        resolver.resolve(ITEM_URL).await,
        Outcome::Success("https://s.click.aliexpress.com/e/_first".to_owned())
    );
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(
        resolver.resolve(ITEM_URL).await,
        Outcome::Success("https://s.click.aliexpress.com/e/_second".to_owned())
    );
    assert_eq!(gateway.requests().await.len(), 2);
}

#[tokio::test]
async fn timeout_with_product_id_falls_back_to_tracked_link() {
    let gateway = ScriptedGateway::with_script(vec![Err(NetworkError::Timeout)]);
    let cache = Arc::new(ResolutionCache::default());
    let resolver = resolver(gateway, Arc::clone(&cache));

    let outcome = resolver.resolve(ITEM_URL).await;

    let Outcome::FallbackSuccess(link) = outcome else {
        panic!("expected fallback, got {outcome:?}");
    };
    assert!(link.starts_with("https://www.aliexpress.com/item/1005001234567890.html?"));
    assert!(link.contains("aff_fcid=my_tracking"));
    assert!(link.contains("aff_platform=default"));
    assert!(cache.is_empty(), "fallback links must not be cached");
}

#[tokio::test]
async fn timeout_with_short_link_is_unresolvable() {
    let gateway = ScriptedGateway::with_script(vec![Err(NetworkError::Timeout)]);
    let resolver = resolver(gateway, Arc::new(ResolutionCache::default()));

    let outcome = resolver.resolve(SHORT_URL).await;

    assert_eq!(
        outcome,
        Outcome::Failure(ResolutionError::Unresolvable {
            cause: RemoteFailure::Network(NetworkError::Timeout)
        })
    );
}

#[tokio::test]
async fn remote_rejection_also_takes_the_fallback_path() {
    let gateway =
        ScriptedGateway::with_script(vec![Ok(rejection_body("405", "invalid tracking id"))]);
    let resolver = resolver(gateway, Arc::new(ResolutionCache::default()));

    assert!(matches!(resolver.resolve(ITEM_URL).await, Outcome::FallbackSuccess(_)));
}

#[tokio::test]
async fn rejection_without_product_id_keeps_remote_message() {
    let gateway =
        ScriptedGateway::with_script(vec![Ok(rejection_body("401", "Invalid app key"))]);
    let resolver = resolver(gateway, Arc::new(ResolutionCache::default()));

    let outcome = resolver.resolve("https://www.aliexpress.com/store/1234567").await;

    match outcome {
        Outcome::Failure(ResolutionError::Unresolvable {
            cause: RemoteFailure::Rejected { code, message },
        }) => {
            assert_eq!(code.as_deref(), Some("401"));
            assert_eq!(message, "Invalid app key");
        }
        other => panic!("expected unresolvable rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn failures_are_not_cached() {
    let gateway = ScriptedGateway::with_script(vec![Err(NetworkError::ConnectionFailed(
        "connection refused".to_owned(),
    ))]);
    let cache = Arc::new(ResolutionCache::default());
    let resolver = resolver(gateway.clone(), Arc::clone(&cache));

    assert!(matches!(resolver.resolve(ITEM_URL).await, Outcome::FallbackSuccess(_)));
    assert_eq!(resolver.resolve(ITEM_URL).await, Outcome::Success(PROMOTION_LINK.to_owned()));
    assert_eq!(gateway.requests().await.len(), 2);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_resolution_leaves_cache_untouched() {
    let cache = Arc::new(ResolutionCache::default());
    let resolver = resolver(Arc::new(HangingGateway), Arc::clone(&cache));

    let result = tokio::time::timeout(Duration::from_secs(5), resolver.resolve(ITEM_URL)).await;

    assert!(result.is_err(), "hanging gateway should never complete");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn enabled_expander_recovers_product_id_from_short_link() {
    let gateway = ScriptedGateway::with_script(vec![Err(NetworkError::Timeout)]);
    let expander = Arc::new(ScriptedExpander {
        result: Ok(format!("{ITEM_URL}?srcSns=sns_Copy")),
        calls: Mutex::new(0),
    });
    let resolver = resolver(gateway, Arc::new(ResolutionCache::default()))
        .with_expander(expander.clone());

    let outcome = resolver.resolve(SHORT_URL).await;

    let Outcome::FallbackSuccess(link) = outcome else {
        panic!("expected fallback, got {outcome:?}");
    };
    assert!(link.contains("/item/1005001234567890.html"));
    assert_eq!(*expander.calls.lock().await, 1);
}

#[tokio::test]
async fn expander_failure_is_treated_as_missing_product_id() {
    let gateway = ScriptedGateway::with_script(vec![Err(NetworkError::Timeout)]);
    let expander = Arc::new(ScriptedExpander {
        result: Err(NetworkError::ConnectionFailed("dns".to_owned())),
        calls: Mutex::new(0),
    });
    let resolver =
        resolver(gateway, Arc::new(ResolutionCache::default())).with_expander(expander);

    assert!(matches!(
        resolver.resolve(SHORT_URL).await,
        Outcome::Failure(ResolutionError::Unresolvable { .. })
    ));
}

#[tokio::test]
async fn expander_is_not_consulted_for_full_links() {
    let gateway = ScriptedGateway::with_script(vec![Err(NetworkError::Timeout)]);
    let expander = Arc::new(ScriptedExpander {
        result: Ok(ITEM_URL.to_owned()),
        calls: Mutex::new(0),
    });
    let resolver = resolver(gateway, Arc::new(ResolutionCache::default()))
        .with_expander(expander.clone());

    let outcome = resolver.resolve("https://www.aliexpress.com/store/1234567").await;

    assert!(matches!(outcome, Outcome::Failure(ResolutionError::Unresolvable { .. })));
    assert_eq!(*expander.calls.lock().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_share_one_cache() {
    let gateway = ScriptedGateway::always_ok();
    let cache = Arc::new(ResolutionCache::default());
    let resolver = Arc::new(resolver(gateway.clone(), Arc::clone(&cache)));

    let handles: Vec<_> = (0..16)
        .map(|index| {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move {
                resolver
                    .resolve(&format!("https://www.aliexpress.com/item/10050012345678{index:02}.html"))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.expect("resolution task should not panic");
        assert_eq!(outcome, Outcome::Success(PROMOTION_LINK.to_owned()));
    }
    assert_eq!(cache.len(), 16);
    assert_eq!(gateway.requests().await.len(), 16);
}
