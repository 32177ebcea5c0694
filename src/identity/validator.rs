use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::ApiConfig;

use super::record::IdentityRecord;

/// Validates credentials against the external usuarios API.
///
/// One outbound POST per attempt, bounded by the configured timeout, no
/// retries. Every failure path resolves to `None`; the caller is responsible
/// for persisting a successful record into the session.
pub struct CredentialValidator {
    cfg: ApiConfig,
    client: reqwest::Client,
}

impl CredentialValidator {
    pub fn new(cfg: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building usuarios API client")?;
        Ok(Self { cfg, client })
    }

    pub fn base_url(&self) -> &str { &self.cfg.base_url }

    /// Forward `(identifier, secret)` to the login endpoint and map the
    /// response onto a record. Empty inputs are rejected locally without a
    /// network call.
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> Option<IdentityRecord> {
        if identifier.is_empty() || secret.is_empty() {
            debug!(target: "auth", "login rejected locally: empty identifier or secret");
            return None;
        }
        let url = format!("{}/usuarios/login", self.cfg.base_url);
        let resp = match self
            .client
            .post(&url)
            .json(&serde_json::json!({"username": identifier, "password": secret}))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                // Timeout and connection-refused land here; same outcome as a
                // rejection for the caller, distinct in the logs.
                warn!(target: "auth", "usuarios API unreachable during login: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(target: "auth", "login rejected by usuarios API: HTTP {}", resp.status());
            return None;
        }
        let body: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "auth", "usuarios API returned unreadable login body: {}", e);
                return None;
            }
        };
        Some(IdentityRecord::from_external(identifier, &body))
    }

    /// Re-fetch the profile behind an existing record using its bearer token.
    ///
    /// This is the only sanctioned identity update path besides re-login: the
    /// fresh record must be re-serialized into the session by the caller.
    /// Returns `None` when the record carries no token or on any failure.
    pub async fn refresh(&self, record: &IdentityRecord) -> Option<IdentityRecord> {
        let token = record.auth_token.as_deref()?;
        let url = format!("{}/usuarios/username/{}", self.cfg.base_url, record.identifier);
        let resp = match self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "auth", "usuarios API unreachable during profile refresh: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            debug!(target: "auth", "profile refresh rejected: HTTP {}", resp.status());
            return None;
        }
        let body: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "auth", "unreadable profile body: {}", e);
                return None;
            }
        };
        // The profile endpoint returns the user object at the top level and
        // no token; wrap it so the login mapping applies, then carry the
        // existing token over.
        let wrapped = serde_json::json!({"usuario": body});
        let mut fresh = IdentityRecord::from_external(&record.identifier, &wrapped);
        fresh.auth_token = record.auth_token.clone();
        Some(fresh)
    }
}
