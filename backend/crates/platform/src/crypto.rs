//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode bytes as base64
pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 to bytes
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::STANDARD.decode(s)
}

/// Public half of an Ed25519 key given its 32-byte seed.
pub fn ed25519_public_key(seed: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(seed).verifying_key().to_bytes()
}

pub fn ed25519_sign(seed: &[u8; 32], message: &[u8]) -> [u8; 64] {
    SigningKey::from_bytes(seed).sign(message).to_bytes()
}

/// Verify an Ed25519 signature. Malformed keys or signatures verify as `false`.
pub fn ed25519_verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(message, &signature).is_ok()
}

/// `#[serde(with = ...)]` adapter storing bytes as a base64 string.
pub mod serde_base64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_base64(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::from_base64(&raw).map_err(serde::de::Error::custom)
    }

    /// Same encoding for optional fields.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&super::super::to_base64(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::super::from_base64(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_values() {
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);

        let hash = sha256(b"hello");
        let expected =
            hex::decode("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }

    #[test]
    fn test_random_bytes() {
        let bytes = random_bytes(32);
        assert_eq!(bytes.len(), 32);
        assert!(bytes.iter().any(|&b| b != 0));
        assert!(random_bytes(0).is_empty());
    }

    #[test]
    fn test_base64_decode_rejects_garbage() {
        assert_eq!(from_base64(&to_base64(b"catalog")).unwrap(), b"catalog");
        assert!(from_base64("***").is_err());
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let seed = [7u8; 32];
        let public = ed25519_public_key(&seed);
        let sig = ed25519_sign(&seed, b"header");

        assert!(ed25519_verify(&public, b"header", &sig));
        assert!(!ed25519_verify(&public, b"tampered", &sig));
        assert!(!ed25519_verify(&ed25519_public_key(&[8u8; 32]), b"header", &sig));
    }

    #[test]
    fn test_ed25519_verify_malformed_inputs() {
        let seed = [1u8; 32];
        let sig = ed25519_sign(&seed, b"m");
        assert!(!ed25519_verify(&[0u8; 5], b"m", &sig));
        assert!(!ed25519_verify(&ed25519_public_key(&seed), b"m", &sig[..10]));
    }

    #[test]
    fn test_serde_base64_fields() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Doc {
            #[serde(with = "serde_base64")]
            key: Vec<u8>,
            #[serde(default, with = "serde_base64::option")]
            sig: Option<Vec<u8>>,
        }

        let doc = Doc { key: vec![1, 2, 3], sig: None };
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"key":"AQID","sig":null}"#);
        assert_eq!(serde_json::from_str::<Doc>(&json).unwrap(), doc);

        let parsed: Doc = serde_json::from_str(r#"{"key":"AQID","sig":"BAU="}"#).unwrap();
        assert_eq!(parsed.sig, Some(vec![4, 5]));
        assert!(serde_json::from_str::<Doc>(r#"{"key":"***"}"#).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"key-1", b"key-1"));
        assert!(!constant_time_eq(b"key-1", b"key-2"));
        assert!(!constant_time_eq(b"key", b"key-1"));
    }
}
