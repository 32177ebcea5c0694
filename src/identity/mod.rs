//! Identity handling for the healthtrack gateway: credential validation
//! against the external usuarios API and per-request materialization of the
//! identity stored in the signed session cookie.
//! Keep the public surface thin and split implementation across sub-modules.

mod record;
mod session;
mod validator;
mod request_context;

pub use record::{IdentityRecord, Role};
pub use session::{SessionPayload, SessionSigner, SessionDecodeError, SESSION_COOKIE};
pub use validator::CredentialValidator;
pub use request_context::{CurrentIdentity, RequestContext};
