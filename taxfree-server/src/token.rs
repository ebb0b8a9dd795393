//! Signed scan token
//!
//! Wire format: `<canonical-json>|<hex-hmac-sha256>`. The payload is the
//! key-sorted JSON of the voucher fields a border agent needs offline.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use shared::models::Voucher;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '|';

/// Decoded payload of a verified token
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScanClaims {
    pub voucher_id: String,
    pub voucher_number: String,
    /// Decimal as string
    pub refund_amount: String,
    pub currency: String,
    /// RFC 3339
    pub expires_at: String,
}

impl ScanClaims {
    pub fn voucher_id(&self) -> Option<i64> {
        self.voucher_id.parse().ok()
    }
}

/// Payload and signature as stored on the voucher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub payload: String,
    pub signature: String,
}

impl SignedToken {
    pub fn wire(&self) -> String {
        format!("{}{SEPARATOR}{}", self.payload, self.signature)
    }
}

/// HMAC signer keyed with the server secret
#[derive(Clone)]
pub struct TokenSigner {
    keyed: HmacSha256,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            keyed: <HmacSha256 as Mac>::new_from_slice(secret.as_ref())?,
        })
    }

    /// Canonical payload for a voucher
    pub fn payload_for(voucher: &Voucher) -> String {
        let mut fields = BTreeMap::new();
        fields.insert("voucher_id", voucher.id.to_string());
        fields.insert("voucher_number", voucher.voucher_number.clone());
        fields.insert("refund_amount", voucher.refund_amount.to_string());
        fields.insert("currency", voucher.currency.clone());
        fields.insert(
            "expires_at",
            shared::util::millis_to_rfc3339(voucher.expires_at).unwrap_or_default(),
        );
        // BTreeMap 序列化天然按 key 排序
        serde_json::to_string(&fields).unwrap_or_default()
    }

    pub fn sign(&self, voucher: &Voucher) -> SignedToken {
        let payload = Self::payload_for(voucher);
        let signature = self.signature(&payload);
        SignedToken { payload, signature }
    }

    /// Hex HMAC-SHA256 of `payload`
    pub fn signature(&self, payload: &str) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Never panics; every malformed input is simply invalid
    pub fn verify(&self, token: &str) -> bool {
        self.decode(token).is_some()
    }

    /// Verify and parse the payload
    pub fn decode(&self, token: &str) -> Option<ScanClaims> {
        let (payload, signature) = token.rsplit_once(SEPARATOR)?;
        let sig_bytes = hex::decode(signature).ok()?;
        // verify_slice 为常量时间比较
        self.mac(payload).verify_slice(&sig_bytes).ok()?;
        serde_json::from_str(payload).ok()
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }
}
