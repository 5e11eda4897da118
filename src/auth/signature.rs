//! Per-request authentication headers
//!
//! The identity provider signs the user id once at login; every API call
//! replays that signature together with the timestamp it was computed
//! against. The upstream verifies the pair, so the header timestamp is the
//! issued one and `signed_at` records the call time for tracing.

use crate::model::Session;
use chrono::{DateTime, Utc};

pub const UID_HEADER: &str = "UID";
pub const SIGNATURE_HEADER: &str = "signature";
pub const TIMESTAMP_HEADER: &str = "signatureTimestamp";

/// Headers attached to one authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub uid: String,
    pub signature: String,
    pub timestamp: String,
    /// When this signature was derived
    pub signed_at: DateTime<Utc>,
}

impl RequestSignature {
    /// Header name/value pairs in wire order
    pub fn headers(&self) -> [(&'static str, &str); 3] {
        [
            (UID_HEADER, self.uid.as_str()),
            (SIGNATURE_HEADER, self.signature.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
        ]
    }
}

/// Derive the request triple for `session` at `now`
///
/// Sessions are only ever handed out by `AuthSession`, which checks their
/// validity window first; signing an expired one is a caller bug.
pub fn sign(session: &Session, now: DateTime<Utc>) -> RequestSignature {
    debug_assert!(
        session.is_valid_at(now),
        "signing a session outside its validity window"
    );
    RequestSignature {
        uid: session.uid.clone(),
        signature: session.uid_signature.clone(),
        timestamp: session.signature_timestamp.clone(),
        signed_at: now,
    }
}
