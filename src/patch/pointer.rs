//! JSON Pointer (RFC 6901) paths for patch targets

use jsonptr::{Pointer, PointerBuf, Token};

/// Array token that addresses the slot past the last element
const APPEND: &str = "-";

/// Escape `key` for use as a single JSON Pointer token
///
/// `~` becomes `~0` and `/` becomes `~1`.
pub fn escape(key: &str) -> Token<'_> {
    Token::new(key)
}

/// Path of map entry or array index `key` below `base`
pub fn child(base: &Pointer, key: &str) -> PointerBuf {
    let mut path = base.to_buf();
    path.push_back(escape(key));
    path
}

/// Path that appends to the array at `base`
pub fn append(base: &Pointer) -> PointerBuf {
    child(base, APPEND)
}
