//! Encrypted envelope for the game API
//!
//! Request and response bodies exchanged with the game servers are
//! MessagePack documents, padded to the AES block size and encrypted with
//! AES-CBC under a fixed per-region key and IV.
//!
//! # Components
//!
//! - [`aes_cbc`]: AES-128/256 CBC with the always-pad scheme
//! - [`msgpack`]: conversion between `serde_json::Value` and the wire form,
//!   with floats narrowed to single precision
//! - [`CryptoCodec`]: the two combined into `pack`/`unpack`
//!
//! # Examples
//!
//! ```
//! use sekai_crypto::CryptoCodec;
//! use serde_json::json;
//!
//! let codec = CryptoCodec::from_hex(
//!     "000102030405060708090a0b0c0d0e0f",
//!     "0f0e0d0c0b0a09080706050403020100",
//! )?;
//!
//! let body = codec.pack(&json!({"accessToken": "abc", "userID": 0}))?;
//! assert_eq!(body.len() % 16, 0);
//!
//! let payload = codec.unpack(&body)?;
//! assert_eq!(payload["accessToken"], "abc");
//! # Ok::<(), sekai_crypto::CryptoError>(())
//! ```

#![warn(missing_docs)]

pub mod aes_cbc;
pub mod codec;
pub mod error;
pub mod msgpack;

pub use aes_cbc::{AesCbcCipher, BLOCK_SIZE};
pub use codec::CryptoCodec;
pub use error::{CryptoError, Result};
