//! Recovery code generation, normalization, and verification hash
//!
//! When a user sets up encryption, a recovery code is generated alongside
//! the password envelope. The code can recover the master key if the
//! password is lost. It is shown to the user exactly once and never stored
//! in this form: only `sha256(normalize(code))` is persisted for
//! verification, plus a master key envelope wrapped under a key derived
//! from the normalized code.
//!
//! The verification hash is deliberately a single fast SHA-256, not a slow
//! KDF: at 32 characters over a 36-symbol alphabet the code itself carries
//! ~165 bits of entropy, which resists brute force without added work
//! factor (passwords don't get that luxury).

use rand::Rng;
use sha2::{Digest, Sha256};

/// Alphabet for recovery codes: uppercase alphanumeric, transcription-safe.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Code length before grouping (32 chars ≈ 165 bits of entropy).
const CODE_LEN: usize = 32;

/// Display grouping: XXXX-XXXX-...
const GROUP_LEN: usize = 4;

/// Generate a fresh recovery code, dash-grouped for human transcription.
pub fn generate_recovery_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(CODE_LEN + CODE_LEN / GROUP_LEN - 1);

    for i in 0..CODE_LEN {
        if i > 0 && i % GROUP_LEN == 0 {
            code.push('-');
        }
        code.push(ALPHABET[rng.gen_range(0..ALPHABET.len())] as char);
    }
    code
}

/// Canonicalize user input: strip dashes and whitespace, uppercase.
///
/// `"wxyz-1234-ab12-99zz"`, `"WXYZ1234AB1299ZZ"` and `" wxyz1234ab1299zz "`
/// all normalize to the same string, and therefore to the same hash and the
/// same derived key.
pub fn normalize_recovery_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Hash a normalized recovery code for storage and verification (hex).
pub fn hash_recovery_code(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
