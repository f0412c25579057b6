use serde::{Deserialize, Serialize};

/// Value persisted under the authenticated-flag key when a session is open.
pub const AUTHENTICATED_SENTINEL: &str = "true";

/// One hour, the lifetime of a client session.
pub const CLIENT_SESSION_MS: i64 = 60 * 60 * 1000;

/// Two hours, the lifetime of an admin session.
pub const ADMIN_SESSION_MS: i64 = 2 * 60 * 60 * 1000;

/// Who a session gate is protecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    /// Portfolio viewer, unlocked with the shared access code.
    Client,
    /// Back-office, unlocked with an admin code.
    Admin,
}

/// Storage keys used by one audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionKeys {
    pub authenticated: &'static str,
    pub expires_at: &'static str,
    /// Third key: the code-version marker for clients, the raw code for admins.
    pub extra: &'static str,
}

impl SessionKeys {
    pub fn all(&self) -> [&'static str; 3] {
        [self.authenticated, self.expires_at, self.extra]
    }
}

impl Audience {
    /// How long a freshly verified session stays valid.
    pub fn session_duration_ms(&self) -> i64 {
        match self {
            Audience::Client => CLIENT_SESSION_MS,
            Audience::Admin => ADMIN_SESSION_MS,
        }
    }

    pub fn keys(&self) -> SessionKeys {
        match self {
            Audience::Client => SessionKeys {
                authenticated: "client_authenticated",
                expires_at: "client_auth_expires_at",
                extra: "client_code_version",
            },
            Audience::Admin => SessionKeys {
                authenticated: "admin_authenticated",
                expires_at: "admin_auth_expires_at",
                extra: "admin_code",
            },
        }
    }

    /// Name of the remote procedure that verifies this audience's code.
    pub fn verify_rpc(&self) -> &'static str {
        match self {
            Audience::Client => "verify_access_code",
            Audience::Admin => "verify_admin_code",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Audience::Client => write!(f, "Client"),
            Audience::Admin => write!(f, "Admin"),
        }
    }
}

/// Persisted session, as read back from the key/value store.
///
/// Anything that cannot be read (missing keys, a non-numeric expiry) is
/// represented as `authenticated: false` or `expires_at: None`; it is never
/// an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub authenticated: bool,
    /// Expiry in milliseconds since the Unix epoch.
    pub expires_at: Option<i64>,
}

impl SessionState {
    /// A session opened at `now_ms` for `audience`.
    pub fn opened(audience: Audience, now_ms: i64) -> Self {
        Self {
            authenticated: true,
            expires_at: Some(now_ms.saturating_add(audience.session_duration_ms())),
        }
    }

    /// Valid iff the flag is set and `now_ms` is strictly before the expiry.
    pub fn is_valid(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => self.authenticated && now_ms < expires_at,
            None => false,
        }
    }

    /// Rebuild from raw persisted strings.
    pub fn from_raw(flag: Option<&str>, expires_at: Option<&str>) -> Self {
        Self {
            authenticated: flag == Some(AUTHENTICATED_SENTINEL),
            expires_at: expires_at.and_then(|raw| raw.trim().parse::<i64>().ok()),
        }
    }
}
