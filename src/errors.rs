//! Error type for trie and routing-table operations

use std::fmt;

/// Errors reported by the trie and its adapters.
///
/// Lookups and deletions never fail; a missing key is `None`. Aborting an
/// enumeration from a visitor is not an error either.
#[derive(Debug)]
pub enum Error {
    /// Non-replacing insert found the key already stored.
    KeyExists,
    /// The key's last byte is `0x00`, which is reserved so keys stay
    /// unambiguous in C-string contexts.
    KeyTailNull,
    /// A CIDR string failed to parse; the underlying error is kept as-is.
    Parse(ipnet::AddrParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyExists => write!(f, "a key already exists"),
            Error::KeyTailNull => write!(f, "can't use a key with the NULL termination"),
            Error::Parse(e) => write!(f, "invalid CIDR: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ipnet::AddrParseError> for Error {
    fn from(e: ipnet::AddrParseError) -> Self {
        Error::Parse(e)
    }
}
