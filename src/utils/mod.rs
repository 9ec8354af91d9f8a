//! Utility functions and helpers
//!
//! Cryptographic primitives, hex encoding and the canonical serialization
//! used for transaction ids and block hashes.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    current_timestamp, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode,
    hex_encode, new_key_pair, public_key_from_pkcs8, sha256_digest, sha256_hex,
};

pub use serialization::{canonical_hash, canonical_json};
