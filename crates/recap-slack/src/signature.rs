//! Slack request signing (`v0`): HMAC-SHA256 over `v0:{timestamp}:{body}`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older (or newer) than this are treated as replays.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the replay window")]
    Stale,
    #[error("malformed signature")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a request against the app's signing secret. `now` is unix seconds.
pub fn verify(
    signing_secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
    let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if (now - ts).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::Stale);
    }

    let sig_hex = signature
        .trim()
        .strip_prefix("v0=")
        .ok_or(SignatureError::Malformed)?;
    let expected = hex::decode(sig_hex).map_err(|_| SignatureError::Malformed)?;

    mac_for(signing_secret, timestamp.trim(), body)?
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// `v0=<hex>` signature for a body, as Slack would send it.
#[cfg(test)]
pub(crate) fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let digest = mac_for(signing_secret, timestamp, body)
        .unwrap()
        .finalize()
        .into_bytes();
    format!("v0={}", hex::encode(digest))
}

fn mac_for(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<HmacSha256, SignatureError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(signing_secret.as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
}
