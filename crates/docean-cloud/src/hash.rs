//! Stable hashing and state functions
//!
//! Set element identity and persisted digests must not change between
//! releases, so everything here is defined on top of fixed algorithms
//! (CRC-32/IEEE and SHA-1) rather than `std::hash`.

use crate::value::Value;
use sha1::{Digest, Sha1};

/// Deterministic non-negative 32-bit hash of a string
pub fn hash_string(s: &str) -> u32 {
    crc32fast::hash(s.as_bytes())
}

/// Hash the canonical forms of several fields, each followed by `-`
pub fn hash_fields<I, S>(fields: I) -> u32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buf = String::new();
    for field in fields {
        buf.push_str(field.as_ref());
        buf.push('-');
    }
    hash_string(&buf)
}

/// Hex SHA-1 digest
pub fn sha1_hex(s: &str) -> String {
    hex::encode(Sha1::digest(s.as_bytes()))
}

/// Set hasher for string elements
pub fn hash_string_value(v: &Value) -> u32 {
    hash_string(&v.canonical())
}

/// Set hasher for elements compared case-insensitively
pub fn hash_lowercase_value(v: &Value) -> u32 {
    hash_string(&v.canonical().to_lowercase())
}

/// State function storing the SHA-1 of long strings such as PEM bodies or
/// cloud-init documents
pub fn state_sha1(v: &Value) -> Value {
    match v {
        Value::String(s) if !s.is_empty() => Value::String(sha1_hex(s)),
        other => other.clone(),
    }
}

/// State function for case-insensitive slugs
pub fn state_lowercase(v: &Value) -> Value {
    match v {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        // CRC-32/IEEE check value
        assert_eq!(hash_string("123456789"), 0xCBF4_3926);
        assert_eq!(hash_string("web"), hash_string("web"));
        assert_ne!(hash_string("web"), hash_string("Web"));
    }

    #[test]
    fn test_hash_fields_separator() {
        assert_eq!(hash_fields(["80", "http"]), hash_string("80-http-"));
        assert_ne!(hash_fields(["8", "0http"]), hash_fields(["80", "http"]));
    }

    #[test]
    fn test_sha1_state_func() {
        assert_eq!(
            state_sha1(&Value::from("#cloud-config")),
            Value::from(sha1_hex("#cloud-config"))
        );
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(state_sha1(&Value::from("")), Value::from(""));
        assert_eq!(state_lowercase(&Value::from("NYC3")), Value::from("nyc3"));
    }
}
