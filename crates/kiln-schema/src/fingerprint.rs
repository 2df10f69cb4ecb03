use crate::types::Fingerprint;
use sha2::{Digest, Sha256};

/// Compute the drift-detection fingerprint of a manifest.
///
/// The digest covers the exact bytes of the source document, not the parsed
/// model, so formatting-only edits change it too. Consumers can recompute it
/// with `sha256sum`.
pub fn fingerprint(raw: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    Fingerprint::new(hex::encode(hasher.finalize()))
}
