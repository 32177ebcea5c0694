use once_cell::sync::OnceCell;
use tracing::debug;

use super::record::IdentityRecord;
use super::session::SessionSigner;

/// The identity view handlers consult: either the reconstructed record of an
/// authenticated principal, or the anonymous identity with every flag in its
/// restrictive state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentIdentity {
    pub authenticated: bool,
    pub record: IdentityRecord,
}

impl CurrentIdentity {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            record: IdentityRecord {
                identifier: String::new(),
                display_name: None,
                email: None,
                role: Default::default(),
                active: false,
                auth_token: None,
                technical_id: None,
            },
        }
    }

    pub fn is_staff_equivalent(&self) -> bool { self.record.is_staff_equivalent() }
    pub fn is_admin_equivalent(&self) -> bool { self.record.is_admin_equivalent() }
}

/// Per-request holder of the raw session cookie, materializing the current
/// identity lazily and at most once.
///
/// Reconstruction never performs network I/O and never fails: a missing,
/// tampered, or undecodable cookie degrades to the anonymous identity. The
/// transition Unresolved -> {Authenticated, Anonymous} happens on first
/// access and is terminal for the request's lifetime.
pub struct RequestContext {
    signer: SessionSigner,
    cookie: Option<String>,
    resolved: OnceCell<CurrentIdentity>,
}

impl RequestContext {
    pub fn new(signer: SessionSigner, cookie: Option<String>) -> Self {
        Self { signer, cookie, resolved: OnceCell::new() }
    }

    /// Accessor for the current identity. Safe to call any number of times;
    /// the cookie is opened and deserialized only on the first call.
    pub fn current_identity(&self) -> &CurrentIdentity {
        self.resolved.get_or_init(|| {
            let Some(cookie) = self.cookie.as_deref() else {
                return CurrentIdentity::anonymous();
            };
            match self.signer.open(cookie) {
                Ok(payload) => CurrentIdentity { authenticated: true, record: payload.to_record() },
                Err(e) => {
                    debug!(target: "session", "session cookie did not materialize: {}", e);
                    CurrentIdentity::anonymous()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSecret;
    use crate::identity::{Role, SessionPayload};

    fn signer() -> SessionSigner {
        SessionSigner::new(&SessionSecret("unit-test-secret".into()))
    }

    #[test]
    fn absent_cookie_materializes_anonymous() {
        let ctx = RequestContext::new(signer(), None);
        let id = ctx.current_identity();
        assert!(!id.authenticated);
        assert!(!id.is_staff_equivalent());
        assert!(!id.record.active);
    }

    #[test]
    fn professional_session_materializes_with_staff_flag() {
        let payload = SessionPayload {
            identifier: "ana".into(),
            email: None,
            role: Role::Professional,
            active: true,
            is_staff_equivalent: false, // stale stored flag, must be recomputed
            is_admin_equivalent: false,
            auth_token: None,
            technical_id: None,
        };
        let s = signer();
        let ctx = RequestContext::new(s.clone(), Some(s.seal(&payload)));
        let id = ctx.current_identity();
        assert!(id.authenticated);
        assert!(id.is_staff_equivalent());
        assert!(!id.is_admin_equivalent());
        assert_eq!(id.record.identifier, "ana");
        assert!(id.record.active);
    }

    #[test]
    fn tampered_cookie_degrades_to_anonymous() {
        let s = signer();
        let payload = SessionPayload {
            identifier: "ana".into(),
            email: None,
            role: Role::Admin,
            active: true,
            is_staff_equivalent: true,
            is_admin_equivalent: true,
            auth_token: None,
            technical_id: None,
        };
        let mut sealed = s.seal(&payload);
        sealed.push('x');
        let ctx = RequestContext::new(s, Some(sealed));
        let id = ctx.current_identity();
        assert!(!id.authenticated);
        assert!(!id.is_admin_equivalent());
    }

    #[test]
    fn second_access_returns_the_same_materialization() {
        let s = signer();
        let payload = SessionPayload {
            identifier: "ana".into(),
            email: None,
            role: Role::User,
            active: true,
            is_staff_equivalent: false,
            is_admin_equivalent: false,
            auth_token: None,
            technical_id: None,
        };
        let ctx = RequestContext::new(s.clone(), Some(s.seal(&payload)));
        let first = ctx.current_identity();
        let second = ctx.current_identity();
        assert_eq!(first, second);
        // memoized: both borrows point at the same resolved value
        assert!(std::ptr::eq(first, second));
    }
}
