use serde::Deserialize;
use serde_json::Value;

use super::{RawResponse, LINK_GENERATE_METHOD};
use crate::domain::outcome::Outcome;
use crate::errors::{RemoteFailure, ResolutionError};

pub const SUCCESS_CODE: &str = "200";
const UNKNOWN_ERROR: &str = "unknown error";

#[derive(Debug, Deserialize)]
struct RespResult {
    resp_code: Option<Value>,
    resp_msg: Option<String>,
    result: Option<LinkResult>,
}

#[derive(Debug, Deserialize)]
struct LinkResult {
    promotion_links: Option<PromotionLinks>,
}

/// The gateway wraps links as `{"promotion_link": [...]}` in some generations
/// and returns them bare in others; within either, one link may come back as
/// an object instead of a one-element list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromotionLinks {
    Wrapped { promotion_link: LinkCollection },
    Bare(LinkCollection),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LinkCollection {
    One(PromotionLink),
    Many(Vec<PromotionLink>),
}

#[derive(Debug, Deserialize)]
struct PromotionLink {
    promotion_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    code: Option<Value>,
    msg: Option<String>,
    sub_msg: Option<String>,
}

/// Interprets a gateway reply. Missing or mistyped fields become a
/// `RemoteRejected` failure; this never panics.
pub fn parse_response(raw: &RawResponse) -> Outcome {
    match extract_link(raw.body()) {
        Ok(link) => Outcome::Success(link),
        Err(failure) => Outcome::Failure(ResolutionError::Remote(failure)),
    }
}

fn extract_link(body: &Value) -> Result<String, RemoteFailure> {
    if let Some(error) = body.get("error_response") {
        return Err(gateway_error(error));
    }

    let envelope_key = format!("{}_response", LINK_GENERATE_METHOD.replace('.', "_"));
    let resp_result = body
        .get(&envelope_key)
        .and_then(|envelope| envelope.get("resp_result"))
        .ok_or_else(|| RemoteFailure::rejected(None, UNKNOWN_ERROR))?;

    let resp_result: RespResult = serde_json::from_value(resp_result.clone())
        .map_err(|error| RemoteFailure::rejected(None, format!("malformed resp_result: {error}")))?;

    let code = resp_result.resp_code.as_ref().and_then(code_string);
    let message = resp_result.resp_msg.filter(|msg| !msg.trim().is_empty());

    if code.as_deref() != Some(SUCCESS_CODE) {
        return Err(RemoteFailure::rejected(code, message.unwrap_or_else(|| UNKNOWN_ERROR.to_owned())));
    }

    let links = match resp_result.result.and_then(|result| result.promotion_links) {
        Some(PromotionLinks::Wrapped { promotion_link }) | Some(PromotionLinks::Bare(promotion_link)) => {
            promotion_link.into_links()
        }
        None => Vec::new(),
    };

    links
        .into_iter()
        .next()
        .and_then(|link| link.promotion_link)
        .filter(|link| !link.trim().is_empty())
        .ok_or_else(|| {
            RemoteFailure::rejected(code, message.unwrap_or_else(|| "no promotion link returned".to_owned()))
        })
}

impl LinkCollection {
    fn into_links(self) -> Vec<PromotionLink> {
        match self {
            Self::One(link) => vec![link],
            Self::Many(links) => links,
        }
    }
}

fn gateway_error(error: &Value) -> RemoteFailure {
    let parsed: Option<GatewayErrorBody> = serde_json::from_value(error.clone()).ok();
    let Some(parsed) = parsed else {
        return RemoteFailure::rejected(None, UNKNOWN_ERROR);
    };

    let code = parsed.code.as_ref().and_then(code_string);
    let message = match (parsed.msg, parsed.sub_msg) {
        (Some(msg), Some(sub_msg)) if !sub_msg.is_empty() => format!("{msg}: {sub_msg}"),
        (Some(msg), _) => msg,
        (None, Some(sub_msg)) => sub_msg,
        (None, None) => UNKNOWN_ERROR.to_owned(),
    };
    RemoteFailure::rejected(code, message)
}

/// Codes arrive as `"200"` or `200` depending on the gateway generation.
fn code_string(code: &Value) -> Option<String> {
    match code {
        Value::String(text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
