use serde::{Deserialize, Serialize};

/// Role of a principal as reported by the external usuarios API.
/// Unknown or missing roles collapse to `User`, the most restrictive state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    User,
    Professional,
    Admin,
}

impl Role {
    /// Parse a wire-level role string. The original API emits the Spanish
    /// spelling "profesional"; newer payloads use "professional". Anything
    /// else, including garbage, is a plain user.
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "profesional" | "professional" => Role::Professional,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Professional => "professional",
            Role::Admin => "admin",
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self { Role::from_wire(&s) }
}

impl From<Role> for String {
    fn from(r: Role) -> Self { r.as_str().to_string() }
}

/// Normalized, request-local representation of an authenticated principal.
///
/// Built from the external login response (or from the session payload) and
/// immutable for the lifetime of one request. Updates flow through a fresh
/// fetch plus re-serialization into the session, never in-place mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub identifier: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub technical_id: Option<String>,
}

impl IdentityRecord {
    /// True for professionals and admins. Pure function of `role`.
    pub fn is_staff_equivalent(&self) -> bool {
        matches!(self.role, Role::Professional | Role::Admin)
    }

    /// True for admins only. Pure function of `role`.
    pub fn is_admin_equivalent(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Map an external login/profile response body onto a record.
    ///
    /// The user object may sit under "usuario" or "user" (the API drifted
    /// between the two); the bearer token is top-level under "token". A
    /// missing user object yields an empty record: every field falls back to
    /// its restrictive default and the submitted identifier stands in for
    /// the missing handle.
    pub fn from_external(submitted_identifier: &str, body: &serde_json::Value) -> Self {
        let user = body
            .get("usuario")
            .or_else(|| body.get("user"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let get_str = |key: &str| user.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());
        let identifier = get_str("username")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| submitted_identifier.to_string());
        // "id" may be a string or a number depending on the backing store
        let technical_id = user.get("id").and_then(|v| {
            v.as_str().map(|s| s.to_string()).or_else(|| v.as_i64().map(|n| n.to_string()))
        });
        Self {
            identifier,
            display_name: get_str("nombre"),
            email: get_str("email"),
            role: user
                .get("rol")
                .and_then(|v| v.as_str())
                .map(Role::from_wire)
                .unwrap_or_default(),
            active: user.get("activo").and_then(|v| v.as_bool()).unwrap_or(false),
            auth_token: body.get("token").and_then(|v| v.as_str()).map(|s| s.to_string()),
            technical_id,
        }
    }
}
