use crate::errors::ServiceError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header the payment gateway signs its notifications with
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies `t=<unix>,v1=<hex>` signatures over `"{t}.{raw body}"`.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

struct ParsedHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<ParsedHeader<'_>, ServiceError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                let parsed = value.parse::<i64>().map_err(|_| {
                    ServiceError::SignatureVerification("invalid signature timestamp".into())
                })?;
                timestamp = Some(parsed);
            }
            Some(("v1", value)) if !value.is_empty() => signatures.push(value),
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(ParsedHeader {
            timestamp,
            signatures,
        }),
        _ => Err(ServiceError::SignatureVerification(
            "malformed signature header".into(),
        )),
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Verifies against the current wall clock.
    pub fn verify(&self, header: Option<&str>, payload: &[u8]) -> Result<(), ServiceError> {
        self.verify_at(header, payload, chrono::Utc::now().timestamp())
    }

    pub fn verify_at(
        &self,
        header: Option<&str>,
        payload: &[u8],
        now: i64,
    ) -> Result<(), ServiceError> {
        if self.secret.is_empty() {
            return Err(ServiceError::SignatureVerification(
                "webhook secret not configured".into(),
            ));
        }

        let header = header.ok_or_else(|| {
            ServiceError::SignatureVerification("missing signature header".into())
        })?;
        let parsed = parse_header(header)?;

        if now.abs_diff(parsed.timestamp) > self.tolerance_secs {
            warn!(
                timestamp = parsed.timestamp,
                now, "Webhook signature timestamp outside tolerance"
            );
            return Err(ServiceError::SignatureVerification(
                "signature timestamp outside tolerance".into(),
            ));
        }

        let mac = self.mac(parsed.timestamp, payload)?;
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });

        if matched {
            Ok(())
        } else {
            Err(ServiceError::SignatureVerification(
                "no matching signature".into(),
            ))
        }
    }

    /// Produces a header value the way the gateway would sign `payload`.
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> Result<String, ServiceError> {
        let digest = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
    }
}
