// ledger/src/keys.rs

//! Key and signature services.
//!
//! The chain core never manages key material itself; it talks to a
//! [`KeyService`] for the two things it needs:
//!
//! - verifying the detached signature every message carries, and
//! - a stable hash of the node's own key, stamped into mined blocks as the
//!   miner identity.
//!
//! [`Ed25519KeyRing`] is the real implementation; [`AcceptAllKeys`] skips
//! verification entirely and exists for tests and throwaway devnets.

use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::types::{Message, MinerId, PublicKey, Signature};

/// Pluggable key and signature backend.
///
/// Implementations must be deterministic and side-effect free; `verify` is
/// called on the hot ingestion path.
pub trait KeyService: Send + Sync {
    /// Checks the message's signature against its embedded sender key.
    fn verify(&self, message: &Message) -> bool;

    /// Hash identifying this node's own key, used as the local miner id.
    fn identity_hash(&self) -> MinerId;
}

/// Ed25519 key ring holding the node's signing key.
///
/// Messages sign their body section (timestamp, payload, recipient) with
/// the sender's key; the sender's public key travels inside the message, so
/// verification needs no key registry.
pub struct Ed25519KeyRing {
    signing: SigningKey,
}

impl Ed25519KeyRing {
    /// Generates a fresh random key ring.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Builds a key ring from a fixed 32-byte seed. Handy for nodes that
    /// keep a stable identity across restarts, and for deterministic tests.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The ring's public key, in the wire representation messages carry.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes().to_vec())
    }

    /// Builds a fully signed message from this ring's key.
    pub fn sign_message(
        &self,
        timestamp: u64,
        payload: Vec<u8>,
        recipient: Option<PublicKey>,
    ) -> Message {
        let mut message = Message {
            sender: self.public_key(),
            timestamp,
            payload,
            recipient,
            signature: Signature(Vec::new()),
        };
        let signature = self.signing.sign(message.signed_section().as_bytes());
        message.signature = Signature(signature.to_bytes().to_vec());
        message
    }
}

impl KeyService for Ed25519KeyRing {
    fn verify(&self, message: &Message) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(message.sender.as_bytes()) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Ed25519Signature::from_slice(message.signature.as_bytes()) else {
            return false;
        };
        key.verify(message.signed_section().as_bytes(), &signature)
            .is_ok()
    }

    fn identity_hash(&self) -> MinerId {
        MinerId::from_public_key(&self.signing.verifying_key().to_bytes())
    }
}

/// A key service that treats every signature as valid.
///
/// Useful for tests and for isolating chain logic from crypto concerns.
pub struct AcceptAllKeys;

impl KeyService for AcceptAllKeys {
    fn verify(&self, _message: &Message) -> bool {
        true
    }

    fn identity_hash(&self) -> MinerId {
        MinerId::from_public_key(b"accept-all-keys")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_messages_verify() {
        let ring = Ed25519KeyRing::generate();
        let message = ring.sign_message(1_700_000_000, b"hello".to_vec(), None);
        assert!(ring.verify(&message));
    }

    #[test]
    fn tampered_messages_fail_verification() {
        let ring = Ed25519KeyRing::generate();
        let mut message = ring.sign_message(1_700_000_000, b"hello".to_vec(), None);
        message.payload[0] ^= 1;
        assert!(!ring.verify(&message));

        // A recipient change also falls inside the signed section.
        let mut readdressed = ring.sign_message(1_700_000_000, b"hi".to_vec(), None);
        readdressed.recipient = Some(ring.public_key());
        assert!(!ring.verify(&readdressed));
    }

    #[test]
    fn malformed_keys_and_signatures_fail_closed() {
        let ring = Ed25519KeyRing::generate();
        let mut message = ring.sign_message(1_700_000_000, b"hello".to_vec(), None);
        message.sender = PublicKey(vec![1, 2, 3]);
        assert!(!ring.verify(&message));

        let mut message = ring.sign_message(1_700_000_000, b"hello".to_vec(), None);
        message.signature = Signature(vec![0; 10]);
        assert!(!ring.verify(&message));
    }

    #[test]
    fn seeded_rings_have_stable_identities() {
        let a = Ed25519KeyRing::from_seed([7u8; 32]);
        let b = Ed25519KeyRing::from_seed([7u8; 32]);
        assert_eq!(a.identity_hash(), b.identity_hash());
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(
            a.identity_hash(),
            Ed25519KeyRing::from_seed([8u8; 32]).identity_hash()
        );
    }

    #[test]
    fn verification_roundtrips_through_the_wire_form() {
        let ring = Ed25519KeyRing::generate();
        let message = ring.sign_message(1_700_000_000, b"over the wire".to_vec(), None);
        let decoded = Message::decode(&message.encode()).expect("valid wire form");
        assert!(ring.verify(&decoded));
    }
}
