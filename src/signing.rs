//! QR ticket signatures.
//!
//! Each ticket carries `HMAC-SHA256(secret, code ":" order_id ":" event_id)`
//! as lowercase hex, so gate scanners can verify tickets offline with only
//! the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies ticket QR payloads with a process-wide secret.
#[derive(Clone)]
pub struct TicketSigner {
    secret: Vec<u8>,
}

impl TicketSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
        }
    }

    /// Lowercase-hex signature over `code:order_id:event_id`.
    pub fn sign(&self, code: &str, order_id: Uuid, event_id: Uuid) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(Self::message(code, order_id, event_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Re-derive and compare in constant time.
    pub fn verify(&self, code: &str, order_id: Uuid, event_id: Uuid, sig_hex: &str) -> bool {
        let Ok(sig_bytes) = hex::decode(sig_hex) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(Self::message(code, order_id, event_id).as_bytes());
        mac.verify_slice(&sig_bytes).is_ok()
    }

    fn message(code: &str, order_id: Uuid, event_id: Uuid) -> String {
        format!("{code}:{order_id}:{event_id}")
    }
}
