//! Property-based tests for the crypto layer.
//!
//! - Sealed secrets open with the same entropy and only with it
//! - Tampering with sealed bytes is detected
//! - Signatures bind to both the message and the key

use warden_crypto::{
    open_secret, seal_secret, short_token, KdfParams, KeyPair, SealedSecret, SigningKey,
};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

/// Fast KDF params for testing (low memory/iterations for speed)
fn fast_kdf_params() -> KdfParams {
    KdfParams {
        memory_cost: 1024, // 1 MiB
        time_cost: 1,
        parallelism: 1,
    }
}

fn entropy_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

fn secret_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

// =============================================================================
// SEALING PROPERTIES
// =============================================================================

mod sealing_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn sealed_secret_opens_with_same_entropy(entropy in entropy_strategy(), secret in secret_strategy()) {
            let params = fast_kdf_params();
            let sealed = seal_secret(&entropy, &secret, &params).unwrap();
            let restored = SealedSecret::from_bytes(&sealed.to_bytes()).unwrap();
            prop_assert_eq!(open_secret(&entropy, &restored, &params).unwrap(), secret);
        }

        #[test]
        fn wrong_entropy_fails(entropy in entropy_strategy(), secret in secret_strategy()) {
            let params = fast_kdf_params();
            let sealed = seal_secret(&entropy, &secret, &params).unwrap();
            let mut other = entropy.clone();
            other.push(0xAA);
            prop_assert!(open_secret(&other, &sealed, &params).is_err());
        }

        #[test]
        fn tampered_ciphertext_fails(secret in secret_strategy(), index in any::<prop::sample::Index>()) {
            let params = fast_kdf_params();
            let sealed = seal_secret(b"entropy", &secret, &params).unwrap();
            let mut bytes = sealed.to_bytes();
            let i = index.index(bytes.len());
            bytes[i] ^= 0x01;
            let reopened = SealedSecret::from_bytes(&bytes)
                .and_then(|s| open_secret(b"entropy", &s, &params));
            prop_assert!(reopened.is_err());
        }
    }
}

// =============================================================================
// SIGNING PROPERTIES
// =============================================================================

mod signing_properties {
    use super::*;

    proptest! {
        #[test]
        fn signature_binds_message(message in prop::collection::vec(any::<u8>(), 0..512), flip in any::<prop::sample::Index>()) {
            let kp = KeyPair::from_signing_key(SigningKey::from_bytes(&[7u8; 32]));
            let sig = kp.signing_key.sign(&message);
            prop_assert!(kp.verifying_key.verify(&message, &sig).is_ok());

            if !message.is_empty() {
                let mut tampered = message.clone();
                let i = flip.index(tampered.len());
                tampered[i] ^= 0x80;
                prop_assert!(kp.verifying_key.verify(&tampered, &sig).is_err());
            }
        }

        #[test]
        fn short_token_is_u16(input in "[a-zA-Z0-9|-]{1,64}") {
            let token = short_token(&input);
            prop_assert!(token.parse::<u16>().is_ok());
            prop_assert_eq!(token, short_token(&input));
        }
    }
}
