use sha1::{Digest, Sha1};

/// Length of a SHA1 digest rendered as hex.
pub const DIGEST_LEN: usize = 40;

/// The length of the digest prefix sent to the range API (5 hex characters).
pub const PREFIX_LEN: usize = 5;

/// Hex lookup table for digest rendering.
pub const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Hashes a password into its uppercase SHA1 hex digest.
///
/// Surrounding whitespace is trimmed first, so `" secret\n"` and `"secret"`
/// produce the same digest.
pub fn sha1_hex(password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.trim().as_bytes());
    let hash: [u8; 20] = hasher.finalize().into();
    encode_upper(&hash)
}

/// Renders raw digest bytes as uppercase hex.
#[inline]
pub fn encode_upper(hash: &[u8; 20]) -> String {
    let mut out = String::with_capacity(DIGEST_LEN);
    for byte in hash {
        out.push(HEX_CHARS[(byte >> 4) as usize] as char);
        out.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Returns true if `candidate` is exactly 40 hex characters (either case).
#[inline]
pub fn is_sha1_hex(candidate: &str) -> bool {
    candidate.len() == DIGEST_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Splits a digest into the range-query prefix and the locally compared suffix.
///
/// Returns `None` when the digest is too short or the prefix is not hex, since
/// such a prefix would only earn a 400 from the range API.
pub fn split_prefix(digest: &str) -> Option<(&str, &str)> {
    if digest.len() < PREFIX_LEN || !digest.is_char_boundary(PREFIX_LEN) {
        return None;
    }
    let (prefix, suffix) = digest.split_at(PREFIX_LEN);
    prefix.bytes().all(|b| b.is_ascii_hexdigit()).then_some((prefix, suffix))
}
