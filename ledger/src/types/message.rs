// ledger/src/types/message.rs

//! Message type and canonical wire form.
//!
//! A message is a single authenticated post. On the wire it is a flat
//! string:
//!
//! ```text
//! <sender-key-hex>&<timestamp>:<payload-hex>[:<recipient-key-hex>]&<signature-hex>
//! ```
//!
//! The middle section (timestamp, payload, optional recipient) is the part
//! covered by the signature. All hex fields are lowercase; decoding is
//! fail-closed and strict enough that `decode(s)` succeeding implies
//! `encode(decode(s)) == s`, so the content hash of a message is computed
//! over an unambiguous canonical string.

use serde::{Deserialize, Serialize};

use super::{Hash256, MessageId, PublicKey, Signature, decode_lower_hex, parse_decimal};

/// A single authenticated post, optionally addressed to a recipient.
///
/// The payload is opaque bytes: plaintext for public posts, ciphertext for
/// private ones. The ledger never interprets or decrypts it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Public key of the author; doubles as the sender identity.
    pub sender: PublicKey,
    /// Wall-clock creation time, in seconds since Unix epoch.
    pub timestamp: u64,
    /// Opaque message body.
    pub payload: Vec<u8>,
    /// Addressee for private messages, absent for public posts.
    pub recipient: Option<PublicKey>,
    /// Detached signature over [`Message::signed_section`].
    pub signature: Signature,
}

impl Message {
    /// Returns the canonical wire string for this message.
    pub fn encode(&self) -> String {
        format!(
            "{}&{}&{}",
            self.sender.to_hex(),
            self.signed_section(),
            self.signature.to_hex()
        )
    }

    /// Returns the section of the wire string covered by the signature:
    /// `<timestamp>:<payload-hex>[:<recipient-key-hex>]`.
    ///
    /// Signing implementations must sign exactly these bytes, and the
    /// verifier checks the signature against them.
    pub fn signed_section(&self) -> String {
        match &self.recipient {
            Some(recipient) => format!(
                "{}:{}:{}",
                self.timestamp,
                hex::encode(&self.payload),
                recipient.to_hex()
            ),
            None => format!("{}:{}", self.timestamp, hex::encode(&self.payload)),
        }
    }

    /// Parses a message from its wire string.
    ///
    /// Fail-closed: any field-count mismatch, uppercase or non-hex field,
    /// empty key/payload/signature field, or unparsable timestamp yields
    /// `None` rather than a partially populated message.
    pub fn decode(s: &str) -> Option<Message> {
        let mut sections = s.split('&');
        let sender_hex = sections.next()?;
        let body = sections.next()?;
        let signature_hex = sections.next()?;
        if sections.next().is_some() {
            return None;
        }

        let sender = PublicKey::from_hex(sender_hex)?;
        let signature = Signature::from_hex(signature_hex)?;

        let mut fields = body.split(':');
        let timestamp = parse_decimal(fields.next()?)?;
        let payload = decode_lower_hex(fields.next()?)?;
        let recipient = match fields.next() {
            Some(recipient_hex) => Some(PublicKey::from_hex(recipient_hex)?),
            None => None,
        };
        if fields.next().is_some() {
            return None;
        }

        Some(Message {
            sender,
            timestamp,
            payload,
            recipient,
            signature,
        })
    }

    /// Computes the content identifier of this message: the BLAKE3-256 hash
    /// of its canonical wire string.
    pub fn compute_id(&self) -> MessageId {
        MessageId(Hash256::compute(self.encode().as_bytes()))
    }
}
