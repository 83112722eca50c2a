use std::io::{self, BufRead};
use std::sync::Arc;

use affilink_core::config::{AppConfig, LoadOptions};
use affilink_core::{
    spawn_sweeper, GatewayBuildError, NetworkError, Outcome, RemoteFailure, ResolutionCache,
    ResolutionError, Resolver,
};
use anyhow::Context;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::commands::resolve::build_runtime;
use crate::commands::{CommandResult, ResolutionPayload, EXIT_FAILURE, EXIT_OK};

const MAX_IN_FLIGHT: usize = 8;

pub fn run(options: &LoadOptions) -> CommandResult {
    run_with_input(options, io::stdin().lock())
}

/// Resolves each non-blank, non-`#` line of `input`; output lines keep input order.
pub fn run_with_input(options: &LoadOptions, input: impl BufRead) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("batch", error),
    };
    crate::init_logging(&config);

    let inputs = match read_inputs(input) {
        Ok(inputs) => inputs,
        Err(error) => {
            return CommandResult::failure(
                "batch",
                "input_read",
                format!("{error:#}"),
                EXIT_FAILURE,
            );
        }
    };

    let runtime = match build_runtime("batch") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let outcomes = runtime.block_on(async {
        let cache = Arc::new(ResolutionCache::new(config.cache.ttl()));
        let resolver = Arc::new(Resolver::from_config(&config, Arc::clone(&cache))?);
        let sweeper = spawn_sweeper(cache, config.cache.sweep_interval());

        let outcomes = resolve_all(resolver, &inputs).await;
        sweeper.abort();
        Ok::<_, GatewayBuildError>(outcomes)
    });

    let outcomes = match outcomes {
        Ok(outcomes) => outcomes,
        Err(error) => {
            return CommandResult::failure(
                "batch",
                "gateway_build",
                error.to_string(),
                EXIT_FAILURE,
            );
        }
    };

    let mut any_failure = false;
    let lines: Vec<String> = inputs
        .iter()
        .zip(&outcomes)
        .map(|(input, outcome)| {
            let payload = ResolutionPayload::new("batch", input, outcome);
            any_failure |= payload.is_failure();
            payload.to_json()
        })
        .collect();

    tracing::info!(
        event_name = "cli.batch.completed",
        inputs = inputs.len(),
        failures = outcomes.iter().filter(|outcome| outcome.error().is_some()).count(),
        "batch resolution finished"
    );

    CommandResult {
        exit_code: if any_failure { EXIT_FAILURE } else { EXIT_OK },
        output: lines.join("\n"),
    }
}

fn read_inputs(input: impl BufRead) -> anyhow::Result<Vec<String>> {
    let mut inputs = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read batch input line {}", index + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        inputs.push(trimmed.to_string());
    }
    Ok(inputs)
}

async fn resolve_all(resolver: Arc<Resolver>, inputs: &[String]) -> Vec<Outcome> {
    let permits = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let mut tasks = JoinSet::new();

    for (index, input) in inputs.iter().cloned().enumerate() {
        let resolver = Arc::clone(&resolver);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            (index, resolver.resolve(&input).await)
        });
    }

    let mut outcomes: Vec<Option<Outcome>> = vec![None; inputs.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(error) => tracing::warn!(
                event_name = "cli.batch.task_failed",
                error = %error,
                "batch resolution task did not complete"
            ),
        }
    }

    outcomes
        .into_iter()
        .map(|outcome| {
            outcome.unwrap_or_else(|| {
                let cause = NetworkError::Unexpected("resolution task aborted".to_string());
                Outcome::Failure(ResolutionError::Remote(RemoteFailure::Network(cause)))
            })
        })
        .collect()
}
