//! Flat remote file names for nested vault paths.
//!
//! The remote store has no folders, so `notes/daily/today.md` is uploaded as
//! `notes__daily__today.md`.  The mapping is not reversible when a segment
//! contains the `__` token or an underscore touches a separator
//! (`notes_/today.md` encodes to `notes___today.md`, which decodes to
//! `notes/_today.md`).

/// Stands in for `/` inside an encoded name.
pub const SEPARATOR_TOKEN: &str = "__";

/// Vault-relative path to remote file name.  Backslashes are treated as
/// separators so paths coming from Windows watchers encode the same way.
pub fn encode(path: &str) -> String {
    normalize(path).replace('/', SEPARATOR_TOKEN)
}

fn normalize(path: &str) -> String {
    path.trim_start_matches(['/', '\\']).replace('\\', "/")
}

pub fn decode(encoded_name: &str) -> String {
    encoded_name.replace(SEPARATOR_TOKEN, "/")
}

/// True when `decode(encode(path))` gives back `path` (after backslash and
/// leading-separator normalization).
pub fn is_reversible(path: &str) -> bool {
    decode(&encode(path)) == normalize(path)
}
