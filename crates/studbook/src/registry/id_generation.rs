//! Hash-based ID generation for dog records.
//!
//! Newly created ancestors get collision-resistant IDs derived from their
//! identifying fields via SHA256, encoded in base36. ID length adapts to
//! registry size (4-6 characters), format `{prefix}-{hash}` (e.g.
//! "dog-a3f8").

use crate::domain::DogId;
use crate::error::{Error, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, warn};

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;

/// Hash-based ID generator with collision detection.
///
/// The generator tracks every ID it has seen, so callers must register the
/// existing registry IDs once before generating. Registry size feeds the
/// adaptive length, so small registries get short, readable IDs.
#[derive(Debug)]
pub struct IdGenerator {
    prefix: String,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Create a generator producing `{prefix}-{hash}` IDs.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            existing_ids: HashSet::new(),
        }
    }

    /// Register an existing ID to prevent collisions.
    pub fn register_id(&mut self, id: &DogId) {
        self.existing_ids.insert(id.as_str().to_string());
    }

    /// Generate a unique ID seeded from the dog's identifying fields.
    ///
    /// # Errors
    ///
    /// Returns an error only if every nonce collides even at maximum
    /// length, which requires an adversarial registry.
    pub fn generate(
        &mut self,
        name: &str,
        breed: &str,
        registration_number: Option<&str>,
    ) -> Result<DogId> {
        let id_length = self.adaptive_length();

        for nonce in 0..MAX_NONCE {
            let id = self.hash_id(name, breed, registration_number, nonce, id_length);
            if !self.existing_ids.contains(&id) {
                if nonce > 0 {
                    debug!(nonce, id_length, "generated unique ID after collision retries");
                }
                self.existing_ids.insert(id.clone());
                return Ok(DogId::new(id));
            }
        }

        if id_length < 6 {
            warn!(
                id_length,
                max_nonce = MAX_NONCE,
                "all nonces exhausted, increasing ID length"
            );
            let longer = self.hash_id(name, breed, registration_number, 0, id_length + 1);
            self.existing_ids.insert(longer.clone());
            return Ok(DogId::new(longer));
        }

        Err(Error::Registry(format!(
            "unable to generate unique ID after {MAX_NONCE} attempts"
        )))
    }

    fn hash_id(
        &self,
        name: &str,
        breed: &str,
        registration_number: Option<&str>,
        nonce: u32,
        length: usize,
    ) -> String {
        let timestamp = Utc::now().timestamp();
        let content = format!(
            "{}|{}|{}|{}|{}",
            name,
            breed,
            registration_number.unwrap_or(""),
            timestamp,
            nonce
        );

        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let hash_bytes = hasher.finalize();

        let hash_str = encode_base36(&hash_bytes[..8], length);
        format!("{}-{}", self.prefix, hash_str)
    }

    /// ID length grows with registry size:
    ///
    /// - 0-500 dogs: 4 chars
    /// - 501-1,500: 5 chars
    /// - 1,501+: 6 chars
    fn adaptive_length(&self) -> usize {
        match self.existing_ids.len() {
            0..=500 => 4,
            501..=1500 => 5,
            _ => 6,
        }
    }
}

/// Encode the first 8 hash bytes as a base36 string of the given length.
///
/// Uses wrapping arithmetic when folding the bytes into a u64; the caller
/// passes at most 8 bytes, and wrapping keeps the output deterministic
/// either way.
fn encode_base36(bytes: &[u8], length: usize) -> String {
    let mut num: u64 = 0;
    for &byte in bytes {
        num = num.wrapping_shl(8).wrapping_add(u64::from(byte));
    }

    let mut result = Vec::new();
    let mut n = num;
    while result.len() < length {
        let remainder = (n % 36) as usize;
        result.push(BASE36_CHARS[remainder]);
        n /= 36;
    }
    result.reverse();

    // BASE36_CHARS is pure ASCII.
    String::from_utf8_lossy(&result).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_encoding_has_requested_length() {
        let result = encode_base36(&[0x12, 0x34, 0x56, 0x78], 4);
        assert_eq!(result.len(), 4);
        assert!(result.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_ids_carry_prefix_and_are_unique() {
        let mut generator = IdGenerator::new("dog");

        let id1 = generator.generate("Rex", "Whippet", None).unwrap();
        let id2 = generator.generate("Rex", "Whippet", None).unwrap();

        assert!(id1.as_str().starts_with("dog-"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn registered_ids_are_never_reissued() {
        let mut generator = IdGenerator::new("dog");
        generator.register_id(&DogId::new("dog-a3f8"));
        generator.register_id(&DogId::new("dog-b4g9"));

        let id = generator.generate("New Dog", "Beagle", None).unwrap();
        assert_ne!(id.as_str(), "dog-a3f8");
        assert_ne!(id.as_str(), "dog-b4g9");
    }

    #[test]
    fn length_adapts_to_registry_size() {
        let mut generator = IdGenerator::new("dog");
        assert_eq!(generator.adaptive_length(), 4);

        for i in 0..800 {
            generator.register_id(&DogId::new(format!("dog-seed{i}")));
        }
        assert_eq!(generator.adaptive_length(), 5);

        for i in 800..2000 {
            generator.register_id(&DogId::new(format!("dog-seed{i}")));
        }
        assert_eq!(generator.adaptive_length(), 6);
    }
}
