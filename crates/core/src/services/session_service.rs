use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::traits::Backend;
use crate::errors::CoreError;
use crate::models::session::{Audience, SessionState};
use crate::storage::session_store::SessionStore;

/// Shown when the verifier could not be reached or failed.
pub const MSG_VERIFY_FAILED: &str = "오류가 발생했습니다. 다시 시도해주세요.";

/// Shown when the verifier rejected the code.
pub const MSG_INVALID_CODE: &str = "유효하지 않은 코드입니다.";

/// Checks a human-entered code with the backend.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait CodeVerifier: Send + Sync {
    /// `Ok(true)` for a valid code, `Ok(false)` for a rejected one.
    async fn verify(&self, code: &str) -> Result<bool, CoreError>;
}

/// Verifies codes through a named remote procedure taking `{ "input_code": … }`.
pub struct RpcCodeVerifier {
    backend: Arc<dyn Backend>,
    function: String,
}

impl RpcCodeVerifier {
    pub fn new(backend: Arc<dyn Backend>, function: impl Into<String>) -> Self {
        Self {
            backend,
            function: function.into(),
        }
    }

    /// Verifier wired to the audience's verification procedure.
    pub fn for_audience(backend: Arc<dyn Backend>, audience: Audience) -> Self {
        Self::new(backend, audience.verify_rpc())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl CodeVerifier for RpcCodeVerifier {
    async fn verify(&self, code: &str) -> Result<bool, CoreError> {
        let response = self
            .backend
            .rpc(&self.function, json!({ "input_code": code }))
            .await?;
        Ok(is_positive_verification(&response))
    }
}

/// Interpret a verification response.
///
/// Positive: `true`, an object whose `valid`/`is_valid` is `true`, or a
/// single-element array holding either. Everything else is negative.
pub fn is_positive_verification(response: &Value) -> bool {
    match response {
        Value::Bool(b) => *b,
        Value::Object(map) => map
            .get("valid")
            .or_else(|| map.get("is_valid"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
        Value::Array(items) if items.len() == 1 => is_positive_verification(&items[0]),
        _ => false,
    }
}

/// What a submission did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Input was blank after trimming; nothing happened.
    Ignored,
    /// Code accepted; session persisted until `expires_at` (epoch millis).
    Authenticated { expires_at: i64 },
    /// Code rejected by the verifier; input cleared.
    InvalidCode,
    /// Verifier or storage failed; input kept so the user can resubmit.
    Failed(String),
}

/// The screen standing between a user and the client viewer or the back-office.
///
/// Validity is evaluated only on [`mount`](SessionGate::mount); once
/// authenticated, the gate stays open in memory until the next mount even if
/// the wall-clock expiry passes. Nothing extends the expiry.
pub struct SessionGate {
    store: SessionStore,
    verifier: Arc<dyn CodeVerifier>,
    /// Client only: sessions persisted under another version are stale.
    code_version: Option<String>,
    input: String,
    message: Option<String>,
    submitting: bool,
    authenticated: bool,
}

impl SessionGate {
    pub fn new(store: SessionStore, verifier: Arc<dyn CodeVerifier>) -> Self {
        Self {
            store,
            verifier,
            code_version: None,
            input: String::new(),
            message: None,
            submitting: false,
            authenticated: false,
        }
    }

    /// Require persisted client sessions to carry `version`.
    /// Ignored for the admin gate, whose third key holds the code itself.
    pub fn with_code_version(mut self, version: Option<String>) -> Self {
        if self.store.audience() == Audience::Client {
            self.code_version = version.filter(|v| !v.trim().is_empty());
        }
        self
    }

    pub fn audience(&self) -> Audience {
        self.store.audience()
    }

    /// Evaluate the persisted session at `now_ms` and return whether the app
    /// (rather than the gate) should be shown.
    pub fn mount(&mut self, now_ms: i64) -> bool {
        let state = self.store.load();
        let mut valid = state.is_valid(now_ms);

        if valid {
            if let Some(expected) = &self.code_version {
                let stored = self.store.load_extra();
                if stored.as_deref() != Some(expected.as_str()) {
                    log::info!(
                        "{} session was issued for code version {:?}, current is {expected}",
                        self.audience(),
                        stored
                    );
                    valid = false;
                }
            }
        }

        self.authenticated = valid;
        self.submitting = false;
        valid
    }

    /// [`mount`](SessionGate::mount) at the current wall-clock time.
    pub fn mount_now(&mut self) -> bool {
        self.mount(now_millis())
    }

    /// In-memory state since the last mount or submission.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    /// Last message for the user, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// True while a verification is in flight (disable the submit control).
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Submit the current input at `now_ms`.
    pub async fn submit(&mut self, now_ms: i64) -> GateOutcome {
        let code = self.input.trim().to_string();
        if code.is_empty() {
            return GateOutcome::Ignored;
        }

        self.submitting = true;
        self.message = None;
        let verdict = self.verifier.verify(&code).await;
        self.submitting = false;

        match verdict {
            Err(e) => {
                log::warn!("{} code verification failed: {e}", self.audience());
                self.message = Some(MSG_VERIFY_FAILED.to_string());
                GateOutcome::Failed(e.to_string())
            }
            Ok(false) => {
                log::info!("{} code rejected", self.audience());
                self.message = Some(MSG_INVALID_CODE.to_string());
                self.input.clear();
                GateOutcome::InvalidCode
            }
            Ok(true) => self.open_session(&code, now_ms),
        }
    }

    /// [`submit`](SessionGate::submit) at the current wall-clock time.
    pub async fn submit_now(&mut self) -> GateOutcome {
        self.submit(now_millis()).await
    }

    fn open_session(&mut self, code: &str, now_ms: i64) -> GateOutcome {
        let state = SessionState::opened(self.audience(), now_ms);
        let extra = match self.audience() {
            Audience::Admin => Some(code),
            Audience::Client => self.code_version.as_deref(),
        };

        if let Err(e) = self.store.save(&state, extra) {
            log::error!("{} session could not be persisted: {e}", self.audience());
            self.message = Some(MSG_VERIFY_FAILED.to_string());
            return GateOutcome::Failed(e.to_string());
        }

        let expires_at = state.expires_at.unwrap_or(now_ms);
        log::info!("{} session opened, expires at {expires_at}", self.audience());
        self.authenticated = true;
        self.input.clear();
        self.message = None;
        GateOutcome::Authenticated { expires_at }
    }

    /// Remove every persisted key and close the gate.
    pub fn logout(&mut self) -> Result<(), CoreError> {
        self.store.clear()?;
        self.authenticated = false;
        self.input.clear();
        self.message = None;
        log::info!("{} session cleared", self.audience());
        Ok(())
    }

    /// The persisted admin code (admin gate only).
    pub fn admin_code(&self) -> Option<String> {
        match self.audience() {
            Audience::Admin => self.store.load_extra(),
            Audience::Client => None,
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
