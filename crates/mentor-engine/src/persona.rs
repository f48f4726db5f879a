//! Persona fingerprinting.
//!
//! A persona hash is a compact fingerprint of the learner's current pace,
//! accuracy band, and recent tone signature. Cached and pending lessons are
//! tagged with the hash they were generated under; a lesson tuned for a
//! now-stale persona is never served, only kept as a replacement candidate.

use sha2::{Digest, Sha256};

use mentor_core::progress::{Pace, ProgressSnapshot, accuracy_band};

/// Number of hex characters kept from the fingerprint digest.
const PERSONA_HASH_LEN: usize = 16;

/// Tone tags folded into the persona signature.
const TONE_SIGNATURE_TAGS: usize = 2;

/// Build the tone signature from recent tone tags (most-recent-first).
#[must_use]
pub fn tone_signature(tone_tags: &[String]) -> String {
    tone_tags
        .iter()
        .take(TONE_SIGNATURE_TAGS)
        .map(|t| t.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join("+")
}

/// Compute the persona hash for a snapshot and tone signature.
///
/// Accuracy is bucketed into bands before hashing so small score movements
/// within a band don't churn the fingerprint; an unknown accuracy hashes as
/// its own distinct marker.
#[must_use]
pub fn persona_hash(pace: Pace, accuracy_pct: Option<u8>, tone_signature: &str) -> String {
    let band = accuracy_pct.map_or_else(|| "u".to_owned(), |p| accuracy_band(p).to_string());
    let seed = format!("{}|{band}|{tone_signature}", pace.as_str());

    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(PERSONA_HASH_LEN);
    for byte in digest.iter().take(PERSONA_HASH_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Persona hash for a snapshot plus tone tags.
#[must_use]
pub fn persona_for(snapshot: &ProgressSnapshot, tone_tags: &[String]) -> String {
    persona_hash(
        snapshot.pace,
        snapshot.accuracy_pct,
        &tone_signature(tone_tags),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
