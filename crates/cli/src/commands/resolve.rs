use std::sync::Arc;

use affilink_core::config::{AppConfig, LoadOptions};
use affilink_core::{ResolutionCache, Resolver};
use tokio::runtime::Runtime;

use crate::commands::{CommandResult, ResolutionPayload, EXIT_FAILURE, EXIT_OK};

pub fn run(options: &LoadOptions, url: &str) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("resolve", error),
    };
    crate::init_logging(&config);

    let runtime = match build_runtime("resolve") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let cache = Arc::new(ResolutionCache::new(config.cache.ttl()));
    let resolver = match Resolver::from_config(&config, cache) {
        Ok(resolver) => resolver,
        Err(error) => {
            return CommandResult::failure(
                "resolve",
                "gateway_build",
                error.to_string(),
                EXIT_FAILURE,
            );
        }
    };

    let outcome = runtime.block_on(resolver.resolve(url));
    let payload = ResolutionPayload::new("resolve", url, &outcome);
    let exit_code = if payload.is_failure() { EXIT_FAILURE } else { EXIT_OK };

    CommandResult { exit_code, output: payload.to_json() }
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_FAILURE,
        )
    })
}
