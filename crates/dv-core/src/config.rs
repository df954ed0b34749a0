use serde::{Deserialize, Serialize};

/// Top-level configuration (loaded from deskvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DvConfig {
    pub crypto: CryptoConfig,
    pub account: AccountConfig,
}

/// Envelope encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iteration count for password/recovery key
    /// derivation (default: 100000). Applies to new wraps only; unwrapping
    /// uses whatever count the envelope was wrapped with.
    pub pbkdf2_iterations: u32,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: 100_000,
        }
    }
}

/// Account/recovery flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Minimum accepted password length (default: 6)
    pub min_password_len: usize,
    /// How long a freshly generated recovery code stays viewable before the
    /// pending reveal expires, in seconds (default: 3600)
    pub reveal_ttl_secs: u64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            min_password_len: 6,
            reveal_ttl_secs: 3600,
        }
    }
}
