//! Tagged envelope codec for wrapped key material
//!
//! Wire format (key envelopes):
//! ```text
//! "ENC:" + base64(salt[16] ‖ iv[12] ‖ tag[16] ‖ ciphertext)
//! ```
//!
//! The salt travels inside the blob because unwrapping requires re-deriving
//! the wrapping key with the same salt. AES-GCM emits `ciphertext ‖ tag`;
//! stored envelopes carry the tag *before* the ciphertext, so the codec
//! reorders on seal and open. The codec is agnostic to whether the wrapping
//! key came from a password or a recovery code.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;

use crate::error::CryptoError;
use crate::kdf::DerivedKey;
use crate::{base64_decode, base64_encode, ENC_PREFIX, IV_SIZE, SALT_SIZE, TAG_SIZE};

/// Decoded layout of a key envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; IV_SIZE],
    pub tag: [u8; TAG_SIZE],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parse an `ENC:`-prefixed blob into its parts.
    ///
    /// Any structural mismatch (missing prefix, bad base64, truncated body)
    /// is `InvalidFormat`: corrupt data, fatal to the operation.
    pub fn parse(blob: &str) -> Result<Self, CryptoError> {
        let b64 = blob
            .strip_prefix(ENC_PREFIX)
            .ok_or(CryptoError::InvalidFormat)?;
        let combined = base64_decode(b64)?;

        if combined.len() <= SALT_SIZE + IV_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidFormat);
        }

        let (salt_bytes, rest) = combined.split_at(SALT_SIZE);
        let (iv_bytes, rest) = rest.split_at(IV_SIZE);
        let (tag_bytes, ciphertext) = rest.split_at(TAG_SIZE);

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(salt_bytes);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(iv_bytes);
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(tag_bytes);

        Ok(Self {
            salt,
            iv,
            tag,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Serialize back to the `ENC:` wire form.
    pub fn encode(&self) -> String {
        let mut combined =
            Vec::with_capacity(SALT_SIZE + IV_SIZE + TAG_SIZE + self.ciphertext.len());
        combined.extend_from_slice(&self.salt);
        combined.extend_from_slice(&self.iv);
        combined.extend_from_slice(&self.tag);
        combined.extend_from_slice(&self.ciphertext);
        format!("{ENC_PREFIX}{}", base64_encode(&combined))
    }

    /// Decrypt the envelope body with the given wrapping key.
    ///
    /// Fails closed: a tag mismatch is `AuthenticationFailed`, whether the
    /// secret was wrong or the data corrupt. Callers cannot tell the two
    /// apart.
    pub fn open(&self, key: &DerivedKey) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from_slice(&self.iv);

        // AES-GCM wants ciphertext ‖ tag
        let mut ct_with_tag = Vec::with_capacity(self.ciphertext.len() + TAG_SIZE);
        ct_with_tag.extend_from_slice(&self.ciphertext);
        ct_with_tag.extend_from_slice(&self.tag);

        cipher
            .decrypt(nonce, ct_with_tag.as_ref())
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

/// Encrypt key material under a wrapping key, producing the `ENC:` blob.
///
/// A fresh random 12-byte nonce is drawn per call; no nonce is ever reused
/// for the same key. The caller supplies the salt that produced `key` so it
/// can travel inside the blob.
pub fn seal(
    plain: &[u8],
    key: &DerivedKey,
    salt: &[u8; SALT_SIZE],
) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut iv = [0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ct_with_tag = cipher
        .encrypt(nonce, plain)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    let (ciphertext, tag_bytes) = ct_with_tag.split_at(ct_with_tag.len() - TAG_SIZE);
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(tag_bytes);

    let envelope = Envelope {
        salt: *salt,
        iv,
        tag,
        ciphertext: ciphertext.to_vec(),
    };
    Ok(envelope.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{derive_key, KdfParams};
    use secrecy::SecretString;

    fn test_key(secret: &str, salt: &[u8; SALT_SIZE]) -> DerivedKey {
        derive_key(
            &SecretString::from(secret),
            salt,
            &KdfParams::new(1000).unwrap(),
        )
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let salt = [3u8; SALT_SIZE];
        let key = test_key("hunter2", &salt);
        let material = [0xABu8; 32];

        let blob = seal(&material, &key, &salt).unwrap();
        assert!(blob.starts_with(ENC_PREFIX));

        let env = Envelope::parse(&blob).unwrap();
        assert_eq!(env.salt, salt);
        assert_eq!(env.open(&key).unwrap(), material);
    }

    #[test]
    fn test_open_wrong_key_fails() {
        let salt = [3u8; SALT_SIZE];
        let key1 = test_key("secret-one", &salt);
        let key2 = test_key("secret-two", &salt);

        let blob = seal(b"key material", &key1, &salt).unwrap();
        let env = Envelope::parse(&blob).unwrap();

        assert_eq!(env.open(&key2), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn test_seal_fresh_nonce_every_call() {
        let salt = [3u8; SALT_SIZE];
        let key = test_key("hunter2", &salt);

        let blob1 = seal(b"same material", &key, &salt).unwrap();
        let blob2 = seal(b"same material", &key, &salt).unwrap();

        assert_ne!(blob1, blob2, "two seals of the same inputs must differ");
    }

    #[test]
    fn test_parse_rejects_missing_prefix() {
        assert_eq!(
            Envelope::parse("c2FsdHNhbHRzYWx0"),
            Err(CryptoError::InvalidFormat)
        );
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert_eq!(
            Envelope::parse("ENC:!!!not-base64!!!"),
            Err(CryptoError::InvalidFormat)
        );
    }

    #[test]
    fn test_parse_rejects_truncated_body() {
        // salt + iv + tag with no ciphertext at all
        let short = crate::base64_encode(&[0u8; SALT_SIZE + IV_SIZE + TAG_SIZE]);
        assert_eq!(
            Envelope::parse(&format!("ENC:{short}")),
            Err(CryptoError::InvalidFormat)
        );
    }

    #[test]
    fn test_encode_parse_roundtrip() {
        let env = Envelope {
            salt: [1u8; SALT_SIZE],
            iv: [2u8; IV_SIZE],
            tag: [3u8; TAG_SIZE],
            ciphertext: vec![4u8; 32],
        };
        let parsed = Envelope::parse(&env.encode()).unwrap();

        assert_eq!(parsed.salt, env.salt);
        assert_eq!(parsed.iv, env.iv);
        assert_eq!(parsed.tag, env.tag);
        assert_eq!(parsed.ciphertext, env.ciphertext);
    }

    #[test]
    fn test_tampered_ciphertext_fails_auth() {
        let salt = [5u8; SALT_SIZE];
        let key = test_key("hunter2", &salt);

        let blob = seal(b"key material", &key, &salt).unwrap();
        let mut env = Envelope::parse(&blob).unwrap();
        env.ciphertext[0] ^= 0xFF;

        assert_eq!(env.open(&key), Err(CryptoError::AuthenticationFailed));
    }
}
