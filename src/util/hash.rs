//! Content hashing for generated symbol names.

use sha2::{Digest, Sha256};

/// Number of hex digits of the content hash embedded in generated names.
pub const NAME_HASH_LEN: usize = 12;

/// A hasher for building fingerprints from multiple components.
///
/// Components are separated so that `("ab", "c")` and `("a", "bc")` hash
/// differently.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return the prefix used inside generated symbol names.
    pub fn finish_short(self) -> String {
        self.finish()[..NAME_HASH_LEN].to_string()
    }
}

/// Hash prefix for a bridge: identical (preamble, signature) pairs converge,
/// anything else diverges.
pub fn bridge_hash(preamble: &str, signature: &str) -> String {
    let mut fp = Fingerprint::new();
    fp.update_str(preamble).update_str(signature);
    fp.finish_short()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_separates_components() {
        let fp1 = {
            let mut fp = Fingerprint::new();
            fp.update_str("ab").update_str("c");
            fp.finish()
        };
        let fp2 = {
            let mut fp = Fingerprint::new();
            fp.update_str("a").update_str("bc");
            fp.finish()
        };
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn test_bridge_hash_shape() {
        let h = bridge_hash("#include <stdio.h>\n", "int puts(char*)");
        assert_eq!(h.len(), NAME_HASH_LEN);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, bridge_hash("#include <stdio.h>\n", "int puts(char*)"));
    }
}
