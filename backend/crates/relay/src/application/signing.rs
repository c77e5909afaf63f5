//! Server signatures on relayed headers

use crate::domain::entities::Header;
use platform::crypto::{ed25519_public_key, ed25519_sign, ed25519_verify, from_base64};

#[derive(Debug, thiserror::Error)]
pub enum SigningKeyError {
    #[error("Signing key is not valid base64")]
    Encoding(#[from] base64::DecodeError),

    #[error("Signing key must be a 32-byte Ed25519 seed, got {0} bytes")]
    Length(usize),
}

/// Signs outgoing headers with this server's routing key.
#[derive(Clone)]
pub struct HeaderSigner {
    seed: [u8; 32],
    public_key: [u8; 32],
}

impl HeaderSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            public_key: ed25519_public_key(&seed),
            seed,
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, SigningKeyError> {
        let bytes = from_base64(encoded.trim())?;
        let seed = <[u8; 32]>::try_from(bytes.as_slice())
            .map_err(|_| SigningKeyError::Length(bytes.len()))?;
        Ok(Self::from_seed(seed))
    }

    /// Key peers find under this server's routing entry.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn sign(&self, header: &mut Header) -> serde_json::Result<()> {
        let message = header.signing_bytes()?;
        header.server_signature = Some(ed25519_sign(&self.seed, &message).to_vec());
        Ok(())
    }
}

impl std::fmt::Debug for HeaderSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderSigner")
            .field("public_key", &platform::crypto::to_base64(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// Unsigned headers and unparsable signatures verify as `false`.
pub fn verify_header(header: &Header, public_key: &[u8]) -> bool {
    let Some(signature) = header.server_signature.as_deref() else {
        return false;
    };
    let Ok(message) = header.signing_bytes() else {
        return false;
    };
    ed25519_verify(public_key, &message, signature)
}
