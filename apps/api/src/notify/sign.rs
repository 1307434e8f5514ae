//! Payment notification signatures.
//!
//! `MD5("k1=v1&k2=v2...&key=<secret>")` in upper-case hex, over the non-empty
//! fields sorted by key. The `sign` field itself never takes part.

use std::collections::BTreeMap;

use md5::{Digest, Md5};

const SIGN_FIELD: &str = "sign";

pub fn generate(params: &BTreeMap<&str, String>, secret: &str) -> String {
    let mut payload = params
        .iter()
        .filter(|(k, v)| **k != SIGN_FIELD && !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    payload.push_str("&key=");
    payload.push_str(secret);

    hex::encode_upper(Md5::digest(payload.as_bytes()))
}

/// An empty supplied signature never verifies.
pub fn verify(params: &BTreeMap<&str, String>, secret: &str, supplied: &str) -> bool {
    !supplied.is_empty() && generate(params, secret) == supplied
}
