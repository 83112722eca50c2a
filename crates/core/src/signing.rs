//! Canonical parameter signing for affiliate gateway calls.
//!
//! Parameters are sorted byte-wise by key and concatenated as `key + value`
//! with no delimiter. The `sign` parameter itself never takes part. The
//! concatenation is then hashed according to the deployment's [`SignMethod`]:
//!
//! - `sha256`: HMAC-SHA256 keyed by the app secret over `api_path + concat`
//! - `md5`: MD5 over `secret + concat + secret` (legacy gateway generation)
//!
//! Both render as uppercase hexadecimal.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::gateway::LINK_GENERATE_METHOD;

type HmacSha256 = Hmac<Sha256>;

pub const SIGN_PARAM: &str = "sign";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignMethod {
    #[default]
    #[serde(rename = "sha256")]
    HmacSha256,
    #[serde(rename = "md5")]
    Md5,
}

impl SignMethod {
    /// Value sent as the `sign_method` request parameter.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::HmacSha256 => "sha256",
            Self::Md5 => "md5",
        }
    }
}

impl fmt::Display for SignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unsupported sign method `{0}` (expected sha256|md5)")]
pub struct UnknownSignMethod(pub String);

impl FromStr for SignMethod {
    type Err = UnknownSignMethod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sha256" | "hmac-sha256" | "hmac_sha256" => Ok(Self::HmacSha256),
            "md5" => Ok(Self::Md5),
            other => Err(UnknownSignMethod(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("app secret cannot be used as an HMAC key")]
    InvalidKey,
}

/// Parameters of one gateway call together with their `sign` value.
///
/// Only [`RequestSigner::sign_request`] builds these, so the signature always
/// matches the parameters it travels with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedRequest {
    params: BTreeMap<String, String>,
}

impl SignedRequest {
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn signature(&self) -> &str {
        self.get(SIGN_PARAM).unwrap_or_default()
    }

    pub fn into_params(self) -> BTreeMap<String, String> {
        self.params
    }
}

#[derive(Clone)]
pub struct RequestSigner {
    secret: SecretString,
    method: SignMethod,
    api_path: String,
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("method", &self.method)
            .field("api_path", &self.api_path)
            .finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(secret: SecretString, method: SignMethod) -> Self {
        Self { secret, method, api_path: format!("/{LINK_GENERATE_METHOD}") }
    }

    pub fn with_api_path(mut self, api_path: impl Into<String>) -> Self {
        self.api_path = api_path.into();
        self
    }

    pub fn method(&self) -> SignMethod {
        self.method
    }

    /// Computes the signature over every parameter except `sign`.
    ///
    /// Input order is irrelevant: keys are sorted byte-wise before hashing.
    pub fn sign<I, K, V>(&self, params: I) -> Result<String, SigningError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let concatenated = canonical_concat(params);
        let secret = self.secret.expose_secret();

        match self.method {
            SignMethod::HmacSha256 => {
                let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                    .map_err(|_| SigningError::InvalidKey)?;
                mac.update(self.api_path.as_bytes());
                mac.update(concatenated.as_bytes());
                Ok(encode_upper_hex(mac.finalize().into_bytes().as_slice()))
            }
            SignMethod::Md5 => {
                let payload = format!("{secret}{concatenated}{secret}");
                Ok(encode_upper_hex(&md5::compute(payload.as_bytes()).0))
            }
        }
    }

    pub fn sign_request(
        &self,
        mut params: BTreeMap<String, String>,
    ) -> Result<SignedRequest, SigningError> {
        params.remove(SIGN_PARAM);
        let signature = self.sign(&params)?;
        params.insert(SIGN_PARAM.to_owned(), signature);
        Ok(SignedRequest { params })
    }

    pub fn verify(&self, request: &SignedRequest) -> bool {
        self.sign(&request.params).is_ok_and(|expected| expected == request.signature())
    }
}

/// `key1value1key2value2...` over the byte-wise sorted keys, `sign` excluded.
pub fn canonical_concat<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> =
        params.into_iter().filter(|(key, _)| key.as_ref() != SIGN_PARAM).collect();
    pairs.sort_by(|(left, _), (right, _)| left.as_ref().as_bytes().cmp(right.as_ref().as_bytes()));

    let mut output = String::new();
    for (key, value) in &pairs {
        output.push_str(key.as_ref());
        output.push_str(value.as_ref());
    }
    output
}

fn encode_upper_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02X}"));
    }
    output
}
