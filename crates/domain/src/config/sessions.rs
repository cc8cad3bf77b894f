use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sessions kept before the least recently used one is evicted.
    #[serde(default = "d_1000")]
    pub max_active: usize,
    /// Sessions idle longer than this are closed. Zero disables expiry.
    #[serde(default = "d_3600")]
    pub idle_ttl_secs: u64,
    /// `Max-Age` of the `session_id` cookie.
    #[serde(default = "d_3600")]
    pub cookie_max_age_secs: u64,
    /// Emit the cookie with the `Secure` attribute.
    #[serde(default = "d_true")]
    pub cookie_secure: bool,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_active: d_1000(),
            idle_ttl_secs: d_3600(),
            cookie_max_age_secs: d_3600(),
            cookie_secure: true,
        }
    }
}

fn d_1000() -> usize {
    1000
}
fn d_3600() -> u64 {
    3600
}
fn d_true() -> bool {
    true
}
