use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// How far a webhook timestamp may drift from server time, in either
/// direction.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signature header malformed")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Stale,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Verify a `Stripe-Signature` style header against the raw request body.
///
/// Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The
/// signed payload is `"{t}.{body}"` and the MAC is HMAC-SHA256 under the
/// endpoint secret. Any one matching `v1` candidate passes; extra schemes in
/// the header are ignored. Comparison is constant-time.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=').ok_or(SignatureError::Malformed)?;
        match key {
            "t" => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?);
            }
            "v1" => {
                candidates.push(hex::decode(value).map_err(|_| SignatureError::Malformed)?);
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    // Saturating: the header timestamp is attacker-controlled and may sit
    // at either i64 extreme.
    let skew = now.timestamp().saturating_sub(timestamp).saturating_abs();
    if skew > tolerance.num_seconds() {
        return Err(SignatureError::Stale);
    }

    for candidate in &candidates {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| SignatureError::Malformed)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Produce a header value `verify` accepts. Used by tests and local tooling
/// that replays webhook deliveries.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn tolerance() -> Duration {
        Duration::seconds(DEFAULT_TOLERANCE_SECS)
    }

    #[test]
    fn signed_payload_verifies() {
        let body = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let now = Utc::now();
        let header = sign(body, SECRET, now.timestamp());

        assert_eq!(verify(body, &header, SECRET, tolerance(), now), Ok(()));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let body = b"original body";
        let now = Utc::now();
        let header = sign(body, SECRET, now.timestamp());

        assert_eq!(
            verify(b"tampered body", &header, SECRET, tolerance(), now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"payload";
        let now = Utc::now();
        let header = sign(body, "whsec_other", now.timestamp());

        assert_eq!(
            verify(body, &header, SECRET, tolerance(), now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected_even_when_mac_matches() {
        let body = b"payload";
        let now = Utc::now();
        let old = now.timestamp() - DEFAULT_TOLERANCE_SECS - 1;
        let header = sign(body, SECRET, old);

        assert_eq!(
            verify(body, &header, SECRET, tolerance(), now),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn future_timestamp_beyond_tolerance_is_rejected() {
        let body = b"payload";
        let now = Utc::now();
        let ahead = now.timestamp() + DEFAULT_TOLERANCE_SECS + 10;
        let header = sign(body, SECRET, ahead);

        assert_eq!(
            verify(body, &header, SECRET, tolerance(), now),
            Err(SignatureError::Stale)
        );
    }

    #[test]
    fn extreme_timestamps_are_rejected_as_stale() {
        let now = Utc::now();
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1=aabb");
            assert_eq!(
                verify(b"x", &header, SECRET, tolerance(), now),
                Err(SignatureError::Stale),
                "timestamp {t} should fall outside tolerance"
            );
        }
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let now = Utc::now();
        for header in [
            "",
            "t=notanumber,v1=aa",
            "v1=aabb",
            "t=123",
            "t=123,v1=zz-not-hex",
        ] {
            assert_eq!(
                verify(b"x", header, SECRET, tolerance(), now),
                Err(SignatureError::Malformed),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn any_matching_candidate_passes() {
        let body = b"payload";
        let now = Utc::now();
        let t = now.timestamp();
        let good = sign(body, SECRET, t);
        let good_mac = good.split("v1=").nth(1).unwrap().to_string();
        let header = format!("t={t},v1={},v1={good_mac}", hex::encode([0u8; 32]));

        assert_eq!(verify(body, &header, SECRET, tolerance(), now), Ok(()));
    }
}
