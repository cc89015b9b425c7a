//! Pack/unpack of structured payloads

use serde_json::Value;

use crate::aes_cbc::AesCbcCipher;
use crate::error::Result;
use crate::msgpack;

/// Encrypting codec for one region
///
/// `pack` serializes to MessagePack, pads and encrypts. `unpack` reverses it.
/// Both are CPU-bound and synchronous; async callers should run them on a
/// blocking worker. The codec is cheap to clone.
#[derive(Debug, Clone)]
pub struct CryptoCodec {
    cipher: AesCbcCipher,
}

impl CryptoCodec {
    /// Create a codec from raw key and IV bytes
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        Ok(Self {
            cipher: AesCbcCipher::new(key, iv)?,
        })
    }

    /// Create a codec from hex-encoded key and IV
    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self> {
        let key = hex::decode(key_hex.trim())?;
        let iv = hex::decode(iv_hex.trim())?;
        Self::new(&key, &iv)
    }

    /// Serialize and encrypt `payload`
    pub fn pack(&self, payload: &Value) -> Result<Vec<u8>> {
        let plain = msgpack::encode(payload)?;
        Ok(self.cipher.encrypt(&plain))
    }

    /// Decrypt and deserialize `ciphertext`
    pub fn unpack(&self, ciphertext: &[u8]) -> Result<Value> {
        let plain = self.cipher.decrypt(ciphertext)?;
        msgpack::decode(&plain)
    }

    /// Underlying block cipher
    pub const fn cipher(&self) -> &AesCbcCipher {
        &self.cipher
    }
}
