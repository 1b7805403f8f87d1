//! Secret protection at rest
//!
//! The registry never stores a plaintext secret: secrets pass through a
//! [`SecretProtector`] before they reach disk. The protector is a capability
//! injected into the store so the core stays portable and testable.
//!
//! [`ScopedProtector`] is the built-in implementation: per-scope keys derived
//! from local identity material, with the scope recorded in the blob so
//! `unprotect` can pick the right key on its own.

use crate::error::{ProtectError, ProtectResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::env;
use std::fs;
use zeroize::Zeroizing;

/// HKDF salt for key derivation; versioned so the blob format can evolve
const KEY_SALT: &[u8] = b"tokpin.secret-protector.v1";

/// XChaCha20Poly1305 nonce length
const NONCE_LEN: usize = 24;

/// Poly1305 authentication tag length
const TAG_LEN: usize = 16;

/// Selects whether a protection key is tied to the invoking user or to
/// the local machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    User,
    Machine,
}

impl Scope {
    /// The byte recorded at the front of every protected blob
    fn tag(self) -> u8 {
        match self {
            Scope::User => 0x01,
            Scope::Machine => 0x02,
        }
    }

    fn from_tag(tag: u8) -> Option<Scope> {
        match tag {
            0x01 => Some(Scope::User),
            0x02 => Some(Scope::Machine),
            _ => None,
        }
    }
}

/// Capability for protecting secrets at rest
///
/// Implementations must fail distinguishably on wrong-scope or corrupt
/// input, never silently return garbage.
pub trait SecretProtector {
    /// Encrypt a secret under the key selected by `scope`
    fn protect(&self, plain: &[u8], scope: Scope) -> ProtectResult<Vec<u8>>;

    /// Recover a secret; the scope is taken from the blob itself
    ///
    /// The returned buffer is zeroed on drop. Callers must not retain it
    /// beyond the single use that needs it.
    fn unprotect(&self, protected: &[u8]) -> ProtectResult<Zeroizing<Vec<u8>>>;
}

/// Encode a protected blob for storage in the config file
pub fn encode_protected(protected: &[u8]) -> String {
    BASE64.encode(protected)
}

/// Decode a protected blob read back from the config file
pub fn decode_protected(text: &str) -> ProtectResult<Vec<u8>> {
    Ok(BASE64.decode(text)?)
}

/// Scope-keyed secret protector
///
/// Blob layout: `[scope tag][24-byte nonce][ciphertext + tag]`. Keys are
/// derived with HKDF-SHA256 from local identity material: the machine id
/// for [`Scope::Machine`], machine id plus user name for [`Scope::User`].
/// Decrypting on another machine, or another user's store with a
/// user-scoped blob, fails at AEAD verification.
pub struct ScopedProtector {
    user_key: Zeroizing<[u8; 32]>,
    machine_key: Zeroizing<[u8; 32]>,
}

impl ScopedProtector {
    /// Build a protector from the local machine and user identity
    pub fn from_environment() -> Self {
        let machine = machine_identity();
        let user = user_identity(&machine);
        Self::with_identity(&machine, &user)
    }

    /// Build a protector from explicit identity material
    pub fn with_identity(machine_material: &[u8], user_material: &[u8]) -> Self {
        ScopedProtector {
            user_key: derive_key(user_material, b"scope:user"),
            machine_key: derive_key(machine_material, b"scope:machine"),
        }
    }

    fn key_for(&self, scope: Scope) -> &[u8; 32] {
        match scope {
            Scope::User => &self.user_key,
            Scope::Machine => &self.machine_key,
        }
    }
}

impl SecretProtector for ScopedProtector {
    fn protect(&self, plain: &[u8], scope: Scope) -> ProtectResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key_for(scope)));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plain)
            .map_err(|_| ProtectError::Protect)?;

        let mut blob = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        blob.push(scope.tag());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    fn unprotect(&self, protected: &[u8]) -> ProtectResult<Zeroizing<Vec<u8>>> {
        if protected.len() < 1 + NONCE_LEN + TAG_LEN {
            return Err(ProtectError::Malformed);
        }

        let scope = Scope::from_tag(protected[0])
            .ok_or(ProtectError::UnknownScope(protected[0]))?;
        let (nonce, ciphertext) = protected[1..].split_at(NONCE_LEN);

        let cipher = XChaCha20Poly1305::new(Key::from_slice(self.key_for(scope)));
        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| ProtectError::Unprotect)
    }
}

/// Derive a 32-byte key from identity material
fn derive_key(material: &[u8], info: &[u8]) -> Zeroizing<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(KEY_SALT), material);
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(info, &mut key[..])
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Stable identity material for the local machine
fn machine_identity() -> Vec<u8> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(raw) = fs::read(path) {
            let id: Vec<u8> = raw
                .into_iter()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            if !id.is_empty() {
                return id;
            }
        }
    }
    env::var("HOSTNAME")
        .map(String::into_bytes)
        .unwrap_or_else(|_| b"tokpin-local-machine".to_vec())
}

/// Identity material tied to the invoking user
fn user_identity(machine: &[u8]) -> Vec<u8> {
    let user = env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());

    let mut material = machine.to_vec();
    material.push(0);
    material.extend_from_slice(user.as_bytes());
    material
}
