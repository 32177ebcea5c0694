use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tprintln;

use super::record::{IdentityRecord, Role};

/// Name of the signed session cookie.
pub const SESSION_COOKIE: &str = "healthtrack_session";

/// Key-derivation context for the cookie MAC. Changing this invalidates all
/// outstanding sessions.
const MAC_CONTEXT: &str = "healthtrack-gateway 2024 session cookie mac v1";

/// Flat session mapping carried in the cookie between requests.
///
/// The derived flags are written for the benefit of non-Rust readers of the
/// cookie but are never trusted on the way back in: `to_record` recomputes
/// them from `role` in case of format drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub identifier: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub is_staff_equivalent: bool,
    #[serde(default)]
    pub is_admin_equivalent: bool,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub technical_id: Option<String>,
}

impl SessionPayload {
    /// Serialize a freshly validated record for storage in the session.
    pub fn from_record(rec: &IdentityRecord) -> Self {
        Self {
            identifier: rec.identifier.clone(),
            email: rec.email.clone(),
            role: rec.role,
            active: rec.active,
            is_staff_equivalent: rec.is_staff_equivalent(),
            is_admin_equivalent: rec.is_admin_equivalent(),
            auth_token: rec.auth_token.clone(),
            technical_id: rec.technical_id.clone(),
        }
    }

    /// Rebuild the identity record, recomputing derived flags from `role`.
    /// The display name is not part of the session shape and comes back empty
    /// until the next refresh.
    pub fn to_record(&self) -> IdentityRecord {
        IdentityRecord {
            identifier: self.identifier.clone(),
            display_name: None,
            email: self.email.clone(),
            role: self.role,
            active: self.active,
            auth_token: self.auth_token.clone(),
            technical_id: self.technical_id.clone(),
        }
    }
}

/// Why a presented cookie failed to open. Internal only: callers degrade to
/// the anonymous identity and at most log the variant.
#[derive(Debug, Error)]
pub enum SessionDecodeError {
    #[error("cookie is not of the form body.mac")]
    Malformed,
    #[error("cookie body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("cookie mac does not verify")]
    BadMac,
    #[error("cookie payload is not a valid session mapping: {0}")]
    Json(#[from] serde_json::Error),
}

/// Seals session payloads into tamper-evident cookie values and opens them
/// back up. MAC is a BLAKE3 keyed hash under a key derived from the
/// configured secret; there is no server-side session store.
#[derive(Clone)]
pub struct SessionSigner {
    key: [u8; 32],
}

impl SessionSigner {
    pub fn new(secret: &crate::config::SessionSecret) -> Self {
        Self { key: blake3::derive_key(MAC_CONTEXT, secret.0.as_bytes()) }
    }

    fn mac_hex(&self, body: &str) -> String {
        blake3::keyed_hash(&self.key, body.as_bytes()).to_hex().to_string()
    }

    /// Produce the cookie value: base64url(json payload) + "." + hex mac.
    pub fn seal(&self, payload: &SessionPayload) -> String {
        // SessionPayload contains no map types, serialization cannot fail
        let json = serde_json::to_string(payload).unwrap_or_default();
        let body = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json.as_bytes());
        let mac = self.mac_hex(&body);
        format!("{}.{}", body, mac)
    }

    /// Verify and parse a presented cookie value.
    pub fn open(&self, cookie: &str) -> Result<SessionPayload, SessionDecodeError> {
        let Some((body, mac)) = cookie.rsplit_once('.') else {
            return Err(SessionDecodeError::Malformed);
        };
        if self.mac_hex(body) != mac {
            return Err(SessionDecodeError::BadMac);
        }
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(body)?;
        let payload: SessionPayload = serde_json::from_slice(&bytes)?;
        tprintln!("session.open identifier={} role={}", payload.identifier, payload.role.as_str());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSecret;

    fn signer() -> SessionSigner {
        SessionSigner::new(&SessionSecret("unit-test-secret".into()))
    }

    fn sample_payload() -> SessionPayload {
        SessionPayload {
            identifier: "ana".into(),
            email: Some("ana@example.com".into()),
            role: Role::Professional,
            active: true,
            is_staff_equivalent: true,
            is_admin_equivalent: false,
            auth_token: Some("t0k".into()),
            technical_id: Some("fs-1".into()),
        }
    }

    #[test]
    fn seal_then_open_preserves_payload() {
        let s = signer();
        let sealed = s.seal(&sample_payload());
        let opened = s.open(&sealed).expect("open");
        assert_eq!(opened, sample_payload());
    }

    #[test]
    fn tampered_body_fails_mac() {
        let s = signer();
        let sealed = s.seal(&sample_payload());
        let mut chars: Vec<char> = sealed.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(matches!(s.open(&tampered), Err(SessionDecodeError::BadMac)));
    }

    #[test]
    fn different_secret_fails_mac() {
        let sealed = signer().seal(&sample_payload());
        let other = SessionSigner::new(&SessionSecret("another-secret".into()));
        assert!(matches!(other.open(&sealed), Err(SessionDecodeError::BadMac)));
    }

    #[test]
    fn garbage_cookie_is_rejected_not_panicked() {
        let s = signer();
        assert!(matches!(s.open("no-dot-here"), Err(SessionDecodeError::Malformed)));
        assert!(s.open("").is_err());
        assert!(s.open("abc.def").is_err());
    }

    #[test]
    fn stored_flags_are_not_trusted_on_reconstruction() {
        // A drifted payload claims admin flags but carries role=user.
        let mut p = sample_payload();
        p.role = Role::User;
        p.is_staff_equivalent = true;
        p.is_admin_equivalent = true;
        let rec = p.to_record();
        assert!(!rec.is_staff_equivalent());
        assert!(!rec.is_admin_equivalent());
    }

    #[test]
    fn session_wire_keys_are_camel_case() {
        let json = serde_json::to_value(sample_payload()).unwrap();
        for key in [
            "identifier", "email", "role", "active",
            "isStaffEquivalent", "isAdminEquivalent", "authToken", "technicalId",
        ] {
            assert!(json.get(key).is_some(), "missing session key {}", key);
        }
        assert_eq!(json["role"], "professional");
    }

    #[test]
    fn unknown_role_string_in_payload_collapses_to_user() {
        let raw = serde_json::json!({
            "identifier": "ana",
            "role": "root",
            "active": true
        });
        let p: SessionPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(p.role, Role::User);
        let rec = p.to_record();
        assert!(!rec.is_staff_equivalent());
        assert!(!rec.is_admin_equivalent());
    }
}
