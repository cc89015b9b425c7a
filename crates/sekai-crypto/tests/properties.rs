//! Property tests for the envelope codec

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use sekai_crypto::{BLOCK_SIZE, CryptoCodec, aes_cbc};
use serde_json::{Map, Value};

fn codec() -> CryptoCodec {
    CryptoCodec::new(b"sixteen byte key", b"sixteen byte iv!").unwrap()
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        // only values that survive the narrowing to f32
        (-1.0e6f32..1.0e6f32).prop_map(|f| Value::from(f64::from(f))),
        "[a-zA-Z0-9 _]{0,24}".prop_map(Value::String),
    ]
}

fn payload() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,10}", inner, 0..8)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

proptest! {
    #[test]
    fn unpack_inverts_pack(value in payload()) {
        let codec = codec();
        let packed = codec.pack(&value).unwrap();
        prop_assert_eq!(packed.len() % BLOCK_SIZE, 0);
        prop_assert_eq!(codec.unpack(&packed).unwrap(), value);
    }

    #[test]
    fn aligned_input_gets_full_pad_block(blocks in 0usize..8, fill in any::<u8>()) {
        let data = vec![fill; blocks * BLOCK_SIZE];
        let padded = aes_cbc::pad(&data);
        prop_assert_eq!(padded.len(), data.len() + BLOCK_SIZE);
        prop_assert!(padded[data.len()..].iter().all(|&b| b == 16));

        // the cipher output grows by exactly one block as well
        let ciphertext = codec().cipher().encrypt(&data);
        prop_assert_eq!(ciphertext.len(), data.len() + BLOCK_SIZE);
    }

    #[test]
    fn pad_length_is_between_one_and_sixteen(data in prop::collection::vec(any::<u8>(), 0..100)) {
        let padded = aes_cbc::pad(&data);
        let added = padded.len() - data.len();
        prop_assert!((1..=16).contains(&added));
        prop_assert_eq!(aes_cbc::unpad(padded).unwrap(), data);
    }
}
