// ═══════════════════════════════════════════════════════════════════
// Session Tests — SessionState validity, SessionGate submit/mount/logout
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

use research_cms_core::backend::memory::MemoryBackend;
use research_cms_core::errors::CoreError;
use research_cms_core::models::session::{
    Audience, SessionState, ADMIN_SESSION_MS, CLIENT_SESSION_MS,
};
use research_cms_core::services::session_service::{
    CodeVerifier, GateOutcome, RpcCodeVerifier, SessionGate, MSG_INVALID_CODE, MSG_VERIFY_FAILED,
};
use research_cms_core::storage::session_store::SessionStore;
use research_cms_core::storage::store::{KeyValueStore, MemoryStore};

// ═══════════════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════════════

/// Verifier with a fixed answer that records the codes it saw.
struct ScriptedVerifier {
    answer: Result<bool, String>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedVerifier {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(true),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            answer: Ok(false),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: Err("connection reset".into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeVerifier for ScriptedVerifier {
    async fn verify(&self, code: &str) -> Result<bool, CoreError> {
        self.seen.lock().unwrap().push(code.to_string());
        self.answer
            .clone()
            .map_err(|message| CoreError::Network(message))
    }
}

/// Store whose reads always fail.
struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, CoreError> {
        Err(CoreError::Storage("disk on fire".into()))
    }
    fn set(&self, _key: &str, _value: &str) -> Result<(), CoreError> {
        Err(CoreError::Storage("disk on fire".into()))
    }
    fn remove(&self, _key: &str) -> Result<(), CoreError> {
        Err(CoreError::Storage("disk on fire".into()))
    }
}

/// Memory store whose writes to one key fail.
struct FailingKeyStore {
    inner: MemoryStore,
    failing_key: &'static str,
}

impl FailingKeyStore {
    fn new(failing_key: &'static str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            failing_key,
        })
    }
}

impl KeyValueStore for FailingKeyStore {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        if key == self.failing_key {
            return Err(CoreError::Storage("quota".into()));
        }
        self.inner.set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.inner.remove(key)
    }
}

fn gate(
    audience: Audience,
    store: &Arc<MemoryStore>,
    verifier: Arc<dyn CodeVerifier>,
) -> SessionGate {
    let store: Arc<dyn KeyValueStore> = store.clone();
    SessionGate::new(SessionStore::new(audience, store), verifier)
}

fn get(store: &MemoryStore, key: &str) -> Option<String> {
    store.get(key).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// SessionState
// ═══════════════════════════════════════════════════════════════════

mod session_state {
    use super::*;

    #[test]
    fn opened_client_lasts_one_hour() {
        let state = SessionState::opened(Audience::Client, 1_000);
        assert!(state.authenticated);
        assert_eq!(state.expires_at, Some(1_000 + CLIENT_SESSION_MS));
        assert_eq!(CLIENT_SESSION_MS, 3_600_000);
    }

    #[test]
    fn opened_admin_lasts_two_hours() {
        let state = SessionState::opened(Audience::Admin, 1_000);
        assert_eq!(state.expires_at, Some(1_000 + ADMIN_SESSION_MS));
        assert_eq!(ADMIN_SESSION_MS, 7_200_000);
    }

    #[test]
    fn boundary_is_strict() {
        let e = 5_000_000;
        let state = SessionState {
            authenticated: true,
            expires_at: Some(e),
        };
        assert!(state.is_valid(e - 1));
        assert!(!state.is_valid(e));
        assert!(!state.is_valid(e + 1));
    }

    #[test]
    fn flag_without_expiry_is_invalid() {
        let state = SessionState::from_raw(Some("true"), None);
        assert!(state.authenticated);
        assert!(!state.is_valid(0));
    }

    #[test]
    fn non_numeric_expiry_is_invalid() {
        let state = SessionState::from_raw(Some("true"), Some("tomorrow"));
        assert_eq!(state.expires_at, None);
        assert!(!state.is_valid(0));
    }

    #[test]
    fn flag_must_be_exact_sentinel() {
        for flag in ["TRUE", "1", "yes", ""] {
            let state = SessionState::from_raw(Some(flag), Some("9999999999999"));
            assert!(!state.is_valid(0), "flag {flag:?} should not authenticate");
        }
    }

    #[test]
    fn expiry_with_whitespace_parses() {
        let state = SessionState::from_raw(Some("true"), Some(" 100 "));
        assert_eq!(state.expires_at, Some(100));
        assert!(state.is_valid(99));
    }

    #[test]
    fn default_is_unauthenticated() {
        assert!(!SessionState::default().is_valid(0));
    }

    #[test]
    fn opened_saturates_near_max() {
        let state = SessionState::opened(Audience::Admin, i64::MAX - 1);
        assert_eq!(state.expires_at, Some(i64::MAX));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Submit
// ═══════════════════════════════════════════════════════════════════

mod submit {
    use super::*;

    #[tokio::test]
    async fn admin_example_code() {
        let store = Arc::new(MemoryStore::new());
        let verifier = ScriptedVerifier::accepting();
        let mut admin = gate(Audience::Admin, &store, verifier.clone());

        admin.set_input("CMSADMIN2027");
        let outcome = admin.submit(1_000_000).await;

        assert_eq!(outcome, GateOutcome::Authenticated { expires_at: 8_200_000 });
        assert!(admin.is_authenticated());
        assert_eq!(get(&store, "admin_authenticated").as_deref(), Some("true"));
        assert_eq!(get(&store, "admin_auth_expires_at").as_deref(), Some("8200000"));
        assert_eq!(get(&store, "admin_code").as_deref(), Some("CMSADMIN2027"));

        let mut reloaded = gate(Audience::Admin, &store, verifier.clone());
        assert!(reloaded.mount(8_199_999));
        assert!(!reloaded.mount(8_200_001));
    }

    #[tokio::test]
    async fn client_expiry_is_one_hour() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());

        client.set_input("welcome");
        let outcome = client.submit(50).await;

        assert_eq!(outcome, GateOutcome::Authenticated { expires_at: 3_600_050 });
        assert_eq!(get(&store, "client_authenticated").as_deref(), Some("true"));
        assert_eq!(get(&store, "client_auth_expires_at").as_deref(), Some("3600050"));
        // No version configured, no admin code for clients.
        assert_eq!(get(&store, "client_code_version"), None);
        assert_eq!(get(&store, "admin_code"), None);
    }

    #[tokio::test]
    async fn input_is_trimmed_before_verification() {
        let store = Arc::new(MemoryStore::new());
        let verifier = ScriptedVerifier::accepting();
        let mut admin = gate(Audience::Admin, &store, verifier.clone());

        admin.set_input("  CODE123 \n");
        admin.submit(0).await;

        assert_eq!(verifier.seen(), vec!["CODE123".to_string()]);
        assert_eq!(get(&store, "admin_code").as_deref(), Some("CODE123"));
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let verifier = ScriptedVerifier::accepting();
        let mut client = gate(Audience::Client, &store, verifier.clone());

        client.set_input("   ");
        let outcome = client.submit(0).await;

        assert_eq!(outcome, GateOutcome::Ignored);
        assert!(verifier.seen().is_empty());
        assert!(store.is_empty());
        assert!(!client.is_authenticated());
        assert_eq!(client.message(), None);
    }

    #[tokio::test]
    async fn rejected_code_clears_input_and_sets_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::rejecting());

        client.set_input("wrong");
        let outcome = client.submit(0).await;

        assert_eq!(outcome, GateOutcome::InvalidCode);
        assert_eq!(client.input(), "");
        assert_eq!(client.message(), Some(MSG_INVALID_CODE));
        assert!(!client.is_authenticated());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn verifier_error_keeps_input() {
        let store = Arc::new(MemoryStore::new());
        let mut admin = gate(Audience::Admin, &store, ScriptedVerifier::failing());

        admin.set_input("CMSADMIN2027");
        let outcome = admin.submit(0).await;

        assert!(matches!(outcome, GateOutcome::Failed(_)));
        assert_eq!(admin.input(), "CMSADMIN2027");
        assert_eq!(admin.message(), Some(MSG_VERIFY_FAILED));
        assert!(!admin.is_authenticated());
        assert!(store.is_empty());
        assert!(!admin.is_submitting());
    }

    #[tokio::test]
    async fn success_clears_previous_message() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::rejecting());
        client.set_input("nope");
        client.submit(0).await;
        assert!(client.message().is_some());

        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        client.set_input("yes");
        client.submit(0).await;
        assert_eq!(client.message(), None);
        assert_eq!(client.input(), "");
    }

    #[tokio::test]
    async fn persist_failure_reports_failed() {
        let verifier = ScriptedVerifier::accepting();
        let mut admin = SessionGate::new(
            SessionStore::new(Audience::Admin, Arc::new(BrokenStore)),
            verifier,
        );

        admin.set_input("CMSADMIN2027");
        let outcome = admin.submit(0).await;

        assert!(matches!(outcome, GateOutcome::Failed(_)));
        assert!(!admin.is_authenticated());
        assert_eq!(admin.message(), Some(MSG_VERIFY_FAILED));
    }

    #[tokio::test]
    async fn failed_admin_code_write_leaves_no_session_behind() {
        let store = FailingKeyStore::new("admin_code");
        let mut admin = SessionGate::new(
            SessionStore::new(Audience::Admin, store.clone()),
            ScriptedVerifier::accepting(),
        );

        admin.set_input("CMSADMIN2027");
        let outcome = admin.submit(1_000_000).await;
        assert!(matches!(outcome, GateOutcome::Failed(ref m) if m.contains("quota")));

        let mut remounted = SessionGate::new(
            SessionStore::new(Audience::Admin, store.clone()),
            ScriptedVerifier::accepting(),
        );
        assert!(!remounted.mount(1_000_001));
        assert_eq!(remounted.admin_code(), None);
        for key in Audience::Admin.keys().all() {
            assert_eq!(store.get(key).unwrap(), None, "{key} left behind");
        }
    }

    #[tokio::test]
    async fn failed_flag_write_rolls_back_earlier_keys() {
        let store = FailingKeyStore::new("admin_authenticated");
        let mut admin = SessionGate::new(
            SessionStore::new(Audience::Admin, store.clone()),
            ScriptedVerifier::accepting(),
        );

        admin.set_input("CMSADMIN2027");
        assert!(matches!(admin.submit(1_000_000).await, GateOutcome::Failed(_)));

        assert_eq!(store.get("admin_code").unwrap(), None);
        assert_eq!(store.get("admin_auth_expires_at").unwrap(), None);
        assert!(!admin.is_authenticated());
    }

    #[tokio::test]
    async fn resubmit_resets_expiry_from_new_time() {
        let store = Arc::new(MemoryStore::new());
        let mut admin = gate(Audience::Admin, &store, ScriptedVerifier::accepting());

        admin.set_input("CODE123");
        admin.submit(0).await;
        admin.set_input("CODE123");
        admin.submit(1_000).await;

        assert_eq!(
            get(&store, "admin_auth_expires_at").as_deref(),
            Some((1_000 + ADMIN_SESSION_MS).to_string().as_str())
        );
    }
}

// ═══════════════════════════════════════════════════════════════════
// Mount
// ═══════════════════════════════════════════════════════════════════

mod mount {
    use super::*;

    fn seeded(flag: Option<&str>, expires: Option<&str>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        if let Some(flag) = flag {
            store.set("client_authenticated", flag).unwrap();
        }
        if let Some(expires) = expires {
            store.set("client_auth_expires_at", expires).unwrap();
        }
        store
    }

    #[test]
    fn empty_store_shows_gate() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(!client.mount(0));
        assert!(!client.is_authenticated());
    }

    #[test]
    fn valid_persisted_session_skips_gate() {
        let store = seeded(Some("true"), Some("10000"));
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(client.mount(9_999));
    }

    #[test]
    fn expiry_boundary() {
        let store = seeded(Some("true"), Some("10000"));
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(client.mount(9_999));
        assert!(!client.mount(10_000));
        assert!(!client.mount(10_001));
    }

    #[test]
    fn flag_without_expiry() {
        let store = seeded(Some("true"), None);
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(!client.mount(0));
    }

    #[test]
    fn garbage_expiry() {
        let store = seeded(Some("true"), Some("not-a-number"));
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(!client.mount(0));
    }

    #[test]
    fn expiry_without_flag() {
        let store = seeded(None, Some("10000"));
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(!client.mount(0));
    }

    #[test]
    fn unreadable_store_fails_closed() {
        let mut admin = SessionGate::new(
            SessionStore::new(Audience::Admin, Arc::new(BrokenStore)),
            ScriptedVerifier::accepting(),
        );
        assert!(!admin.mount(0));
    }

    #[test]
    fn audiences_do_not_share_sessions() {
        let store = seeded(Some("true"), Some("10000"));
        let mut admin = gate(Audience::Admin, &store, ScriptedVerifier::accepting());
        assert!(!admin.mount(0));
    }

    #[tokio::test]
    async fn stale_until_next_mount() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        client.set_input("welcome");
        client.submit(0).await;

        // In-memory state does not notice the expiry on its own.
        assert!(client.is_authenticated());
        assert!(!client.mount(CLIENT_SESSION_MS));
        assert!(!client.is_authenticated());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Client code version
// ═══════════════════════════════════════════════════════════════════

mod code_version {
    use super::*;

    #[tokio::test]
    async fn version_is_persisted_on_success() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting())
            .with_code_version(Some("2026-10".into()));

        client.set_input("welcome");
        client.submit(0).await;

        assert_eq!(get(&store, "client_code_version").as_deref(), Some("2026-10"));
        assert!(client.mount(1));
    }

    #[tokio::test]
    async fn rotated_version_invalidates_session() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting())
            .with_code_version(Some("v1".into()));
        client.set_input("welcome");
        client.submit(0).await;

        let mut rotated = gate(Audience::Client, &store, ScriptedVerifier::accepting())
            .with_code_version(Some("v2".into()));
        assert!(!rotated.mount(1));
    }

    #[test]
    fn missing_marker_invalidates_when_version_configured() {
        let store = Arc::new(MemoryStore::new());
        store.set("client_authenticated", "true").unwrap();
        store.set("client_auth_expires_at", "10000").unwrap();

        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting())
            .with_code_version(Some("v1".into()));
        assert!(!client.mount(0));
    }

    #[test]
    fn marker_ignored_without_configured_version() {
        let store = Arc::new(MemoryStore::new());
        store.set("client_authenticated", "true").unwrap();
        store.set("client_auth_expires_at", "10000").unwrap();
        store.set("client_code_version", "old").unwrap();

        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting())
            .with_code_version(None);
        assert!(client.mount(0));
    }

    #[tokio::test]
    async fn admin_gate_ignores_version() {
        let store = Arc::new(MemoryStore::new());
        let mut admin = gate(Audience::Admin, &store, ScriptedVerifier::accepting())
            .with_code_version(Some("v1".into()));
        admin.set_input("CMSADMIN2027");
        admin.submit(0).await;

        assert_eq!(get(&store, "admin_code").as_deref(), Some("CMSADMIN2027"));
        assert!(admin.mount(1));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Logout
// ═══════════════════════════════════════════════════════════════════

mod logout {
    use super::*;

    #[tokio::test]
    async fn removes_all_three_admin_keys() {
        let store = Arc::new(MemoryStore::new());
        let mut admin = gate(Audience::Admin, &store, ScriptedVerifier::accepting());
        admin.set_input("CMSADMIN2027");
        admin.submit(0).await;
        assert_eq!(store.len(), 3);

        admin.logout().unwrap();

        assert!(store.is_empty());
        assert!(!admin.is_authenticated());
        assert_eq!(admin.admin_code(), None);
        assert!(!admin.mount(1));
    }

    #[tokio::test]
    async fn client_logout_leaves_admin_session() {
        let store = Arc::new(MemoryStore::new());
        let mut admin = gate(Audience::Admin, &store, ScriptedVerifier::accepting());
        admin.set_input("CMSADMIN2027");
        admin.submit(0).await;

        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting())
            .with_code_version(Some("v1".into()));
        client.set_input("welcome");
        client.submit(0).await;
        client.logout().unwrap();

        assert_eq!(get(&store, "client_authenticated"), None);
        assert_eq!(get(&store, "client_auth_expires_at"), None);
        assert_eq!(get(&store, "client_code_version"), None);
        assert!(admin.mount(1));
    }

    #[test]
    fn logout_on_empty_store_is_fine() {
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(Audience::Client, &store, ScriptedVerifier::accepting());
        assert!(client.logout().is_ok());
    }

    #[test]
    fn logout_reports_store_errors() {
        let mut admin = SessionGate::new(
            SessionStore::new(Audience::Admin, Arc::new(BrokenStore)),
            ScriptedVerifier::accepting(),
        );
        assert!(matches!(admin.logout(), Err(CoreError::Storage(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════
// RPC verifier
// ═══════════════════════════════════════════════════════════════════

mod rpc_verifier {
    use super::*;

    #[tokio::test]
    async fn sends_input_code_to_audience_procedure() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_rpc_response("verify_admin_code", json!(true)).unwrap();
        let verifier = RpcCodeVerifier::for_audience(backend.clone(), Audience::Admin);

        assert!(verifier.verify("CMSADMIN2027").await.unwrap());

        let calls = backend.rpc_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function, "verify_admin_code");
        assert_eq!(calls[0].args, json!({ "input_code": "CMSADMIN2027" }));
    }

    #[tokio::test]
    async fn object_and_array_responses() {
        let backend = Arc::new(MemoryBackend::new());
        let verifier = RpcCodeVerifier::for_audience(backend.clone(), Audience::Client);

        backend
            .set_rpc_response("verify_access_code", json!([{ "is_valid": true }]))
            .unwrap();
        assert!(verifier.verify("a").await.unwrap());

        backend
            .set_rpc_response("verify_access_code", json!({ "valid": false }))
            .unwrap();
        assert!(!verifier.verify("a").await.unwrap());
    }

    #[tokio::test]
    async fn unscripted_response_is_negative() {
        let backend = Arc::new(MemoryBackend::new());
        let verifier = RpcCodeVerifier::for_audience(backend, Audience::Client);
        assert!(!verifier.verify("a").await.unwrap());
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_rpc_error("verify_access_code", "boom").unwrap();
        let verifier = RpcCodeVerifier::for_audience(backend, Audience::Client);
        assert!(matches!(
            verifier.verify("a").await,
            Err(CoreError::Api { .. })
        ));
    }

    #[tokio::test]
    async fn gate_with_failing_backend_keeps_input() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_rpc_error("verify_access_code", "boom").unwrap();
        let store = Arc::new(MemoryStore::new());
        let mut client = gate(
            Audience::Client,
            &store,
            Arc::new(RpcCodeVerifier::for_audience(backend, Audience::Client)),
        );

        client.set_input("welcome");
        assert!(matches!(client.submit(0).await, GateOutcome::Failed(_)));
        assert_eq!(client.input(), "welcome");
    }
}
