//! AES-CBC block layer for the game envelope
//!
//! The game uses plain AES in CBC mode with a fixed key and IV per region:
//! - 16-byte keys select AES-128, 32-byte keys select AES-256
//! - IV is always one block (16 bytes)
//! - Padding always adds 1..=16 bytes, each equal to the pad length
//!
//! Padding is applied here rather than through the cipher crate so that the
//! lenient strip on decrypt (trailing byte is the pad length, nothing else is
//! checked) matches what the servers emit.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

use crate::error::{CryptoError, Result};

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

#[derive(Clone)]
enum Key {
    Aes128([u8; 16]),
    Aes256([u8; 32]),
}

/// AES-CBC cipher bound to one key/IV pair
#[derive(Clone)]
pub struct AesCbcCipher {
    key: Key,
    iv: [u8; BLOCK_SIZE],
}

impl AesCbcCipher {
    /// Create a cipher from raw key and IV bytes
    ///
    /// # Arguments
    /// * `key` - 16 (AES-128) or 32 (AES-256) byte key
    /// * `iv` - 16-byte initialization vector
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let iv: [u8; BLOCK_SIZE] = iv.try_into().map_err(|_| CryptoError::InvalidIvSize {
            expected: BLOCK_SIZE,
            actual: iv.len(),
        })?;

        let key = match key.len() {
            16 => {
                let mut k = [0u8; 16];
                k.copy_from_slice(key);
                Key::Aes128(k)
            }
            32 => {
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                Key::Aes256(k)
            }
            actual => return Err(CryptoError::InvalidKeySize { actual }),
        };

        Ok(Self { key, iv })
    }

    /// Key length in bits
    pub const fn key_bits(&self) -> usize {
        match self.key {
            Key::Aes128(_) => 128,
            Key::Aes256(_) => 256,
        }
    }

    /// Pad and encrypt `plaintext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let padded = pad(plaintext);
        match &self.key {
            Key::Aes128(key) => Aes128CbcEnc::new(key.into(), (&self.iv).into())
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
            Key::Aes256(key) => Aes256CbcEnc::new(key.into(), (&self.iv).into())
                .encrypt_padded_vec_mut::<NoPadding>(&padded),
        }
    }

    /// Decrypt `ciphertext` and strip the trailing pad
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::Misaligned {
                len: ciphertext.len(),
            });
        }

        let plain = match &self.key {
            Key::Aes128(key) => Aes128CbcDec::new(key.into(), (&self.iv).into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            Key::Aes256(key) => Aes256CbcDec::new(key.into(), (&self.iv).into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
        }
        .map_err(|_| CryptoError::Misaligned {
            len: ciphertext.len(),
        })?;

        unpad(plain)
    }
}

impl std::fmt::Debug for AesCbcCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCbcCipher")
            .field("key_bits", &self.key_bits())
            .finish_non_exhaustive()
    }
}

/// Append `16 - len % 16` bytes, each holding that count
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(data.len() + pad_len);
    out.extend_from_slice(data);
    #[allow(clippy::cast_possible_truncation)]
    out.resize(data.len() + pad_len, pad_len as u8);
    out
}

/// Strip as many bytes as the trailing byte says
pub fn unpad(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let len = data.len();
    let pad = data.last().map_or(0, |&b| usize::from(b));
    if pad == 0 || pad > len {
        return Err(CryptoError::InvalidPadding { pad, len });
    }
    data.truncate(len - pad);
    Ok(data)
}
