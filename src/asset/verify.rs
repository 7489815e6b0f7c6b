//! Detached signature checks for gated cape tiers.
//!
//! Premium and founder capes are only shown if the launcher signed the exact bytes we loaded.
//! Signatures are RSA PKCS#1 v1.5 over a SHA-256 digest of the raw file, and travel as base64.

use base64::{engine::general_purpose::STANDARD, Engine};
use eyre::Result;
use rsa::{
    pkcs1v15::{Signature, VerifyingKey},
    pkcs8::DecodePublicKey,
    signature::Verifier,
    RsaPublicKey,
};
use sha2::Sha256;
use strum::{Display, EnumString};

/// The launcher's signing key.
const LAUNCHER_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAubfM33cxdO/n30JtyNKa
a8z1ea2YH21NUjp2Gu8qsRivbfdpSBLCwNg/U1v6ZLhaVPQ5IhhHBJ5RfvRc/c6p
qLj3CXvyN5XvFV0l0LB9ZttLShtUrhKNz09nY3vbADl7sVB/jVkAexYqZzzPQwAO
NuyVDi3mRM3HYDeh7tIqP4ULqqnYIfptlsUPSTmTA4ndUe3YkGQQJZkKzhtxABFg
77kE+6iC7Kz4JB3679A1D3x0N/tiNWXcG4LY0PUTUKhzhCDd6Vm8AXqjwpb+5bug
hEV8T15eSuph2yoXpEqlcp5UMqe3iWc5bEqe9/IN8nVIroGEokJwBznIwwbXQFXu
/QIDAQAB
-----END PUBLIC KEY-----
";

/// Cape tiers, as written in the catalog and configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Tier {
    #[default]
    Free,
    Premium,
    Founder,
}

impl Tier {
    /// Parses a tier name. Anything we don't recognise is a free cape.
    pub fn parse(raw: &str) -> Tier {
        raw.trim().parse().unwrap_or_default()
    }

    /// Returns true if capes of this tier need a valid signature.
    pub fn is_gated(self) -> bool {
        matches!(self, Tier::Premium | Tier::Founder)
    }
}

/// Decodes a base64 signature. Whitespace (including line breaks in `.sig` files) is ignored.
/// Returns `None` for blank or malformed input.
pub fn decode_signature(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.is_empty() {
        return None;
    }

    match STANDARD.decode(compact) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            log::warn!("Ignoring malformed signature: {}", err);
            None
        }
    }
}

/// Checks signatures against a single public key.
pub struct SignatureGate {
    key: Option<VerifyingKey<Sha256>>,
}

impl SignatureGate {
    /// Creates a gate that checks against the launcher's key.
    pub fn embedded() -> SignatureGate {
        match SignatureGate::from_public_key_pem(LAUNCHER_PUBLIC_KEY_PEM) {
            Ok(gate) => gate,
            Err(err) => {
                // Without a key nothing verifies, so gated capes stay hidden.
                log::error!("Unable to load launcher public key: {:?}", err);
                SignatureGate { key: None }
            }
        }
    }

    /// Creates a gate from an SPKI PEM public key.
    pub fn from_public_key_pem(pem: &str) -> Result<SignatureGate> {
        let key = RsaPublicKey::from_public_key_pem(pem)?;

        Ok(SignatureGate {
            key: Some(VerifyingKey::new(key)),
        })
    }

    /// Returns true if `signature` is a valid signature of `bytes`. A missing or empty signature
    /// never verifies.
    pub fn verify(&self, bytes: &[u8], signature: Option<&[u8]>) -> bool {
        let (Some(key), Some(signature)) = (&self.key, signature) else {
            return false;
        };

        if signature.is_empty() {
            return false;
        }

        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };

        key.verify(bytes, &signature).is_ok()
    }
}
