pub mod cache;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod errors;
pub mod expander;
pub mod gateway;
pub mod resolver;
pub mod signing;

pub use cache::{spawn_sweeper, ResolutionCache};
pub use classifier::UrlClassifier;
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::outcome::{Outcome, OutcomeKind};
pub use domain::product::ProductId;
pub use errors::{NetworkError, RemoteFailure, ResolutionError};
pub use expander::{HttpShortLinkExpander, ShortLinkExpander};
pub use gateway::{
    parse_response, GatewayBuildError, HttpLinkGateway, LinkGateway, LinkRequestTemplate,
    RawResponse,
};
pub use resolver::Resolver;
pub use signing::{RequestSigner, SignMethod, SignedRequest, SigningError};
