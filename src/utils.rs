use std::sync::OnceLock;

use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

use crate::error::BridgeError;

/// Generate a random lowercase alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| (b as char).to_ascii_lowercase())
        .take(len)
        .collect()
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:/@+-]*$").expect("static pattern is valid")
    })
}

/// Reject values that would need quoting before being placed in a script.
///
/// Container ids, interface names, image references and socket paths are
/// interpolated verbatim, so anything outside this set is refused.
pub fn ensure_shell_token<'a>(kind: &'static str, value: &'a str) -> Result<&'a str, BridgeError> {
    let trimmed = value.strip_prefix('/').unwrap_or(value);
    if token_pattern().is_match(trimmed) {
        Ok(value)
    } else {
        Err(BridgeError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}
