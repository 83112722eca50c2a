use std::collections::BTreeMap;

use affilink_core::config::{AppConfig, LoadOptions};
use affilink_core::gateway::LINK_GENERATE_METHOD;
use affilink_core::{RequestSigner, SignMethod};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::{escape_json, CommandResult, EXIT_CONFIG, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const CONFIG_DEPENDENT_CHECKS: [&str; 3] =
    ["credential_readiness", "signer_self_check", "gateway_endpoint"];

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { EXIT_OK } else { EXIT_CONFIG };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_credentials(&config));
            checks.push(check_signer(&config));
            checks.push(check_gateway_endpoint(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in CONFIG_DEPENDENT_CHECKS {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_credentials(config: &AppConfig) -> DoctorCheck {
    let marketplace = &config.marketplace;
    let secret = marketplace.app_secret.expose_secret();

    let problem = if marketplace.app_key.chars().any(char::is_whitespace) {
        Some("app_key contains whitespace")
    } else if secret.trim() != secret {
        Some("app_secret has leading or trailing whitespace")
    } else if marketplace.tracking_id.chars().any(char::is_whitespace) {
        Some("tracking_id contains whitespace")
    } else {
        None
    };

    match problem {
        Some(problem) => DoctorCheck {
            name: "credential_readiness",
            status: CheckStatus::Fail,
            details: format!("{problem}; requests would be rejected by the gateway"),
        },
        None => DoctorCheck {
            name: "credential_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "app key `{}` and tracking id `{}` are present",
                marketplace.app_key, marketplace.tracking_id
            ),
        },
    }
}

fn check_signer(config: &AppConfig) -> DoctorCheck {
    let method = config.marketplace.sign_method;
    let signer = RequestSigner::new(config.marketplace.app_secret.clone(), method);

    let mut params = BTreeMap::new();
    params.insert("method".to_string(), LINK_GENERATE_METHOD.to_string());
    params.insert("app_key".to_string(), config.marketplace.app_key.clone());
    params.insert("timestamp".to_string(), "0".to_string());

    let expected_len = match method {
        SignMethod::HmacSha256 => 64,
        SignMethod::Md5 => 32,
    };

    match signer.sign_request(params) {
        Ok(request) if signer.verify(&request) && request.signature().len() == expected_len => {
            DoctorCheck {
                name: "signer_self_check",
                status: CheckStatus::Pass,
                details: format!("{method} signature computed and verified"),
            }
        }
        Ok(_) => DoctorCheck {
            name: "signer_self_check",
            status: CheckStatus::Fail,
            details: format!("{method} signature did not verify"),
        },
        Err(error) => DoctorCheck {
            name: "signer_self_check",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_gateway_endpoint(config: &AppConfig) -> DoctorCheck {
    let gateway_url = &config.marketplace.gateway_url;
    if gateway_url.starts_with("https://") {
        DoctorCheck {
            name: "gateway_endpoint",
            status: CheckStatus::Pass,
            details: format!("requests go to `{gateway_url}`"),
        }
    } else {
        DoctorCheck {
            name: "gateway_endpoint",
            status: CheckStatus::Fail,
            details: format!(
                "`{gateway_url}` is not https; signed requests would travel in clear text"
            ),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
