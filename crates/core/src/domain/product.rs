use std::fmt;

use serde::{Deserialize, Serialize};

/// Marketplace identifiers are large integers; shorter digit runs are usually
/// unrelated path segments (store ids, page numbers).
pub const MIN_PRODUCT_ID_DIGITS: usize = 11;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    pub fn parse(candidate: &str) -> Option<Self> {
        let valid = candidate.len() >= MIN_PRODUCT_ID_DIGITS
            && candidate.bytes().all(|byte| byte.is_ascii_digit());
        valid.then(|| Self(candidate.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ProductId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("`{value}` is not a marketplace product id"))
    }
}

impl From<ProductId> for String {
    fn from(value: ProductId) -> Self {
        value.0
    }
}
