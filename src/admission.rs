//! Session admission.
//!
//! Decides whether a caller-supplied identifier may be used as a session, and
//! pulls that identifier out of request headers.
//!
//! The policy runs in one of two modes:
//!
//! - **Strict**: the identifier must already be in the [`SessionRegistry`].
//! - **Bypass**: any non-empty identifier is registered on sight and admitted.
//!
//! In both modes a missing or empty identifier is rejected.
//!
//! The mode is looked up on every call through a [`ModeSwitch`], so flipping the
//! environment variable (or a shared toggle) takes effect without a restart.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use thread_session::admission::{AdmissionPolicy, ModeSwitch};
//! use thread_session::session::SessionRegistry;
//!
//! let registry = Arc::new(SessionRegistry::new());
//! let bypass = Arc::new(AtomicBool::new(false));
//! let policy = AdmissionPolicy::new(registry.clone(), ModeSwitch::Toggle(bypass.clone()));
//!
//! assert!(!policy.is_valid(Some("thread-1")));
//! bypass.store(true, std::sync::atomic::Ordering::SeqCst);
//! assert!(policy.is_valid(Some("thread-1")));
//! assert!(registry.contains("thread-1"));
//! ```

use crate::http::Headers;
use crate::session::SessionRegistry;
use logwise::privacy::LogIt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable consulted by [`ModeSwitch::environment`].
pub const BYPASS_VARIABLE: &str = "MCP_SESSION_BYPASS";

/// Header names tried, in order, by [`extract_session_id`].
pub const SESSION_HEADERS: [&str; 5] = [
    "X-Session-ID",
    "mcp-session-id",
    "x-session-id",
    "X-Session-Id",
    "Mcp-Session-Id",
];

/// Names matched ignoring case, in order, once no exact name has matched.
const FALLBACK_HEADERS: [&str; 2] = ["x-session-id", "mcp-session-id"];

/// How identifiers are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionMode {
    /// Only identifiers registered beforehand are admitted.
    Strict,
    /// Any non-empty identifier is registered and admitted.
    Bypass,
}

/// Where the current [`AdmissionMode`] comes from.
#[derive(Debug, Clone)]
pub enum ModeSwitch {
    /// Bypass iff the named environment variable is `"true"` (any case).
    Environment {
        /// The variable to read.
        variable: String,
    },
    /// Bypass iff the flag is set.
    Toggle(Arc<AtomicBool>),
    /// A mode that never changes.
    Fixed(AdmissionMode),
}

impl ModeSwitch {
    /// Reads [`BYPASS_VARIABLE`] on every call.
    pub fn environment() -> Self {
        ModeSwitch::Environment {
            variable: BYPASS_VARIABLE.to_string(),
        }
    }

    /// The mode in effect right now.
    pub fn current(&self) -> AdmissionMode {
        let bypass = match self {
            ModeSwitch::Environment { variable } => std::env::var(variable)
                .map(|value| value.to_lowercase() == "true")
                .unwrap_or(false),
            ModeSwitch::Toggle(flag) => flag.load(Ordering::SeqCst),
            ModeSwitch::Fixed(mode) => *mode == AdmissionMode::Bypass,
        };
        if bypass {
            AdmissionMode::Bypass
        } else {
            AdmissionMode::Strict
        }
    }
}

/// Admission decisions over a shared [`SessionRegistry`].
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    registry: Arc<SessionRegistry>,
    switch: ModeSwitch,
}

impl AdmissionPolicy {
    pub fn new(registry: Arc<SessionRegistry>, switch: ModeSwitch) -> Self {
        AdmissionPolicy { registry, switch }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The mode that the next call to [`is_valid`](Self::is_valid) will use.
    pub fn mode(&self) -> AdmissionMode {
        self.switch.current()
    }

    /// Whether `session_id` is an admissible session.
    ///
    /// In bypass mode an admitted identifier is registered as a side effect.
    pub fn is_valid(&self, session_id: Option<&str>) -> bool {
        let Some(session_id) = session_id.filter(|id| !id.is_empty()) else {
            return false;
        };
        match self.mode() {
            AdmissionMode::Bypass => {
                self.registry.register(session_id);
                true
            }
            AdmissionMode::Strict => {
                let known = self.registry.contains(session_id);
                if !known {
                    logwise::warn_sync!(
                        "Rejected unregistered session: {session}",
                        session = LogIt(&session_id)
                    );
                }
                known
            }
        }
    }
}

/// Finds the session identifier in `headers`.
///
/// The exact names in [`SESSION_HEADERS`] are tried first, in order; then
/// `x-session-id` and `mcp-session-id` ignoring case, in that order.
/// Empty values are skipped. `None` means the request carries no identifier.
///
/// ```
/// use thread_session::admission::extract_session_id;
/// use thread_session::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "application/json");
/// headers.insert("MCP-SESSION-ID", "thread-7");
/// assert_eq!(extract_session_id(&headers), Some("thread-7"));
///
/// assert_eq!(extract_session_id(&Headers::new()), None);
/// ```
pub fn extract_session_id(headers: &Headers) -> Option<&str> {
    SESSION_HEADERS
        .iter()
        .find_map(|name| headers.get(name).filter(|value| !value.is_empty()))
        .or_else(|| {
            FALLBACK_HEADERS.iter().find_map(|name| {
                headers
                    .iter()
                    .find(|(n, value)| n.eq_ignore_ascii_case(name) && !value.is_empty())
                    .map(|(_, value)| value)
            })
        })
}
