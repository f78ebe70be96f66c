use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// Hashes a sequence of byte strings into a stable 64-bit value.
///
/// Uses SipHash-1-3 with zero keys, so the result is identical across
/// processes and restarts. Each part is length-prefixed, which keeps
/// `["ab", "c"]` and `["a", "bc"]` apart.
pub fn stable_hash<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> u64 {
    let mut hasher = SipHasher13::new();
    for part in parts {
        hasher.write_u64(part.len() as u64);
        hasher.write(part);
    }
    hasher.finish()
}
