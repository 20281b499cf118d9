// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC signatures over raw webhook bodies.
//!
//! Platforms sign the exact bytes they POST with the application secret and
//! send `<algo>=<hex digest>` in a header. Verification must run on the raw
//! body: re-serializing a parsed payload changes the bytes and breaks it.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

/// Digest used by a platform integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// `X-Hub-Signature: sha1=<hex>` (Messenger).
    Sha1,
    /// `X-Hub-Signature-256: sha256=<hex>` (WhatsApp Cloud).
    Sha256,
}

impl SignatureAlgorithm {
    /// Scheme prefix in the signature header value.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1=",
            Self::Sha256 => "sha256=",
        }
    }

    /// Name of the header carrying the signature.
    pub fn header_name(self) -> &'static str {
        match self {
            Self::Sha1 => "x-hub-signature",
            Self::Sha256 => "x-hub-signature-256",
        }
    }
}

/// Computes the header value the platform would send for `body`.
pub fn sign(algorithm: SignatureAlgorithm, secret: &str, body: &[u8]) -> String {
    let digest = match algorithm {
        SignatureAlgorithm::Sha1 => mac_bytes::<Hmac<Sha1>>(secret, body),
        SignatureAlgorithm::Sha256 => mac_bytes::<Hmac<Sha256>>(secret, body),
    };
    format!("{}{}", algorithm.prefix(), hex::encode(digest))
}

/// Checks a signature header against `body`, in constant time.
///
/// A missing scheme prefix or malformed hex is a rejection, never an error.
pub fn verify(algorithm: SignatureAlgorithm, secret: &str, body: &[u8], header: &str) -> bool {
    let Some(digest_hex) = header.trim().strip_prefix(algorithm.prefix()) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    match algorithm {
        SignatureAlgorithm::Sha1 => verify_mac::<Hmac<Sha1>>(secret, body, &expected),
        SignatureAlgorithm::Sha256 => verify_mac::<Hmac<Sha256>>(secret, body, &expected),
    }
}

fn mac_bytes<M: Mac + hmac::digest::KeyInit>(secret: &str, body: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this branch is never taken.
    let Ok(mut mac) = <M as hmac::digest::KeyInit>::new_from_slice(secret.as_bytes()) else {
        return Vec::new();
    };
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

fn verify_mac<M: Mac + hmac::digest::KeyInit>(secret: &str, body: &[u8], expected: &[u8]) -> bool {
    let Ok(mut mac) = <M as hmac::digest::KeyInit>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(expected).is_ok()
}
