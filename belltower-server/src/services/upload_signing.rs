use serde::Serialize;
use sha1::{Digest, Sha1};

/// Signed parameters for a direct upload to the media host.
/// The client must submit exactly `folder` and `timestamp` alongside the signature.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadSignature {
    pub signature: String,
    pub timestamp: i64,
    pub api_key: String,
    pub cloud_name: String,
}

/// Canonical string: parameters in alphabetical order joined as a query string,
/// followed directly by the secret.
pub fn canonical_string(folder: &str, timestamp: i64, secret: &str) -> String {
    format!("folder={}&timestamp={}{}", folder, timestamp, secret)
}

pub fn sign(folder: &str, timestamp: i64, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_string(folder, timestamp, secret).as_bytes());
    format!("{:x}", hasher.finalize())
}
