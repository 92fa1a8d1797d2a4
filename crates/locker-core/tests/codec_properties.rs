use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use locker_core::crypto::codec::HEADER_LEN;
use locker_core::{Codec, CryptoCodec, KdfParams, LockerError};
use proptest::prelude::*;
use secrecy::SecretString;

fn codec(secret: &str) -> CryptoCodec {
    CryptoCodec::with_params(SecretString::from(secret.to_string()), KdfParams::new(64, 1, 1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn marshal_then_unmarshal_returns_input(
        secret in "[a-zA-Z0-9]{1,24}",
        value in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let codec = codec(&secret);
        let record = codec.marshal(&value).unwrap();
        prop_assert_eq!(codec.unmarshal(&record).unwrap(), value);
    }

    #[test]
    fn different_secret_never_decrypts(
        secret in "[a-z]{1,16}",
        value in proptest::collection::vec(any::<u8>(), 0..128),
    ) {
        let record = codec(&secret).marshal(&value).unwrap();
        let other = format!("{}!", secret);
        prop_assert!(matches!(
            codec(&other).unmarshal(&record),
            Err(LockerError::AuthenticationFailure)
        ));
    }

    #[test]
    fn same_input_seals_differently(value in proptest::collection::vec(any::<u8>(), 0..64)) {
        let codec = codec("MAGIK");
        let first = codec.marshal(&value).unwrap();
        let second = codec.marshal(&value).unwrap();
        prop_assert_ne!(first, second);
    }

    #[test]
    fn flipped_byte_after_header_fails_authentication(
        value in proptest::collection::vec(any::<u8>(), 1..64),
        position in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let codec = codec("MAGIK");
        let mut blob = STANDARD.decode(codec.marshal(&value).unwrap()).unwrap();
        let index = HEADER_LEN + position.index(blob.len() - HEADER_LEN);
        blob[index] ^= mask;

        prop_assert!(matches!(
            codec.unmarshal(&STANDARD.encode(&blob)),
            Err(LockerError::AuthenticationFailure)
        ));
    }

    #[test]
    fn other_valid_header_params_fail_authentication(
        memory_kib in 8u32..=256,
        iterations in 1u32..=2,
    ) {
        prop_assume!(memory_kib != 64 || iterations != 1);
        let codec = codec("MAGIK");
        let mut blob = STANDARD.decode(codec.marshal(b"a@b.com").unwrap()).unwrap();
        blob[1..5].copy_from_slice(&memory_kib.to_le_bytes());
        blob[5..9].copy_from_slice(&iterations.to_le_bytes());

        prop_assert!(matches!(
            codec.unmarshal(&STANDARD.encode(&blob)),
            Err(LockerError::AuthenticationFailure)
        ));
    }
}
