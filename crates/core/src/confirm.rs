//! Propose/confirm/cancel handshake for peer transfers.
//!
//! The pending state lives entirely in the button identifier handed back to
//! the chat surface: `confirm_<sender>_<receiver>_<amount>_<issued>_<sig>`
//! or `cancel_<sender>_<issued>_<sig>`. Fields are positional; the final
//! segment is an HMAC-SHA256 signature over everything before it, so a
//! tampered or truncated identifier fails verification instead of moving
//! someone else's funds. Tokens expire after the configured TTL.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::{ConfirmError, TokenError};

type HmacSha256 = Hmac<Sha256>;

pub const CONFIRM_PREFIX: &str = "confirm";
pub const CANCEL_PREFIX: &str = "cancel";

pub const DEFAULT_TTL_SECS: u64 = 300;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProposalAction {
    Confirm { receiver_id: String, amount: u64 },
    Cancel,
}

/// A decoded, signature-verified confirmation token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalToken {
    pub sender_id: String,
    pub action: ProposalAction,
    pub issued_at: DateTime<Utc>,
}

impl ProposalToken {
    /// Only the proposer may confirm or cancel. A rejected actor does not
    /// consume the proposal; the proposer can still act on it.
    pub fn authorize(&self, actor_id: &str) -> Result<(), ConfirmError> {
        if actor_id == self.sender_id {
            Ok(())
        } else {
            Err(ConfirmError::Unauthorized)
        }
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    signing_key: Vec<u8>,
    ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(signing_key: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self { signing_key: signing_key.as_ref().to_vec(), ttl_secs }
    }

    /// Whether `custom_id` looks like one of ours. Lets the click handler
    /// ignore components owned by other features without decode errors.
    /// The separator is part of the check so ids that merely share a word
    /// prefix (`confirmation.v2`) are not claimed.
    pub fn recognizes(custom_id: &str) -> bool {
        match custom_id.split_once('_') {
            Some((prefix, _)) => prefix == CONFIRM_PREFIX || prefix == CANCEL_PREFIX,
            None => false,
        }
    }

    pub fn encode_confirm(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: u64,
        issued_at: DateTime<Utc>,
    ) -> String {
        let payload = format!(
            "{CONFIRM_PREFIX}_{sender_id}_{receiver_id}_{amount}_{}",
            issued_at.timestamp()
        );
        let signature = hmac_hex(&self.signing_key, payload.as_bytes());
        format!("{payload}_{signature}")
    }

    pub fn encode_cancel(&self, sender_id: &str, issued_at: DateTime<Utc>) -> String {
        let payload = format!("{CANCEL_PREFIX}_{sender_id}_{}", issued_at.timestamp());
        let signature = hmac_hex(&self.signing_key, payload.as_bytes());
        format!("{payload}_{signature}")
    }

    pub fn decode(&self, token: &str) -> Result<ProposalToken, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Decode against an explicit clock. Split out so expiry is testable
    /// without sleeping.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<ProposalToken, TokenError> {
        let (payload, signature) = token.rsplit_once('_').ok_or(TokenError::Malformed)?;
        self.verify(payload, signature)?;

        let parts: Vec<&str> = payload.split('_').collect();
        let decoded = match parts.as_slice() {
            [CONFIRM_PREFIX, sender_id, receiver_id, amount, issued] => ProposalToken {
                sender_id: require_id(sender_id)?,
                action: ProposalAction::Confirm {
                    receiver_id: require_id(receiver_id)?,
                    amount: amount.parse().map_err(|_| TokenError::Malformed)?,
                },
                issued_at: parse_issued_at(issued)?,
            },
            [CANCEL_PREFIX, sender_id, issued] => ProposalToken {
                sender_id: require_id(sender_id)?,
                action: ProposalAction::Cancel,
                issued_at: parse_issued_at(issued)?,
            },
            _ => return Err(TokenError::Malformed),
        };

        let age = now.signed_duration_since(decoded.issued_at).num_seconds();
        if age < 0 || age as u64 > self.ttl_secs {
            return Err(TokenError::Expired);
        }

        Ok(decoded)
    }

    fn verify(&self, payload: &str, signature_hex: &str) -> Result<(), TokenError> {
        let signature = decode_hex(signature_hex).ok_or(TokenError::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|_| TokenError::BadSignature)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::BadSignature)
    }
}

fn require_id(candidate: &str) -> Result<String, TokenError> {
    if candidate.is_empty() {
        return Err(TokenError::Malformed);
    }
    Ok(candidate.to_owned())
}

fn parse_issued_at(raw: &str) -> Result<DateTime<Utc>, TokenError> {
    let seconds = raw.parse::<i64>().map_err(|_| TokenError::Malformed)?;
    Utc.timestamp_opt(seconds, 0).single().ok_or(TokenError::Malformed)
}

fn hmac_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(payload);
    encode_hex(mac.finalize().into_bytes().as_slice())
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }

    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks_exact(2) {
        let high = hex_nibble(pair[0])?;
        let low = hex_nibble(pair[1])?;
        decoded.push((high << 4) | low);
    }
    Some(decoded)
}

fn hex_nibble(value: u8) -> Option<u8> {
    match value {
        b'0'..=b'9' => Some(value - b'0'),
        b'a'..=b'f' => Some(value - b'a' + 10),
        b'A'..=b'F' => Some(value - b'A' + 10),
        _ => None,
    }
}
