// SPDX-License-Identifier: MIT

//! ID generation and newtype ID helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shorten an id-like string to its first `n` characters for log lines.
pub trait ShortId {
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        let end = self.char_indices().nth(n).map(|(i, _)| i).unwrap_or(self.len());
        &self[..end]
    }
}

/// Defines a newtype wrapper around `String` with the usual comparison,
/// display, and borrowing impls used for entity names and opaque handles.
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self, n: usize) -> &str {
                $crate::id::ShortId::short(self.0.as_str(), n)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::std::convert::From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl ::std::convert::From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl ::std::cmp::PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl ::std::cmp::PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl ::std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generates opaque ids, one per call. Implementations must be cheap to
/// clone and safe to share across tasks.
pub trait IdGen: Send + Sync {
    fn next(&self) -> String;
}

/// Production id generator: a fresh random UUID per call.
#[derive(Debug, Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic id generator for tests: `"{prefix}-{n}"`, incrementing.
#[derive(Debug, Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_id!(ProcessName);

    #[test]
    fn short_truncates_to_n_chars() {
        let id = ProcessName::new("0123456789abcdef");
        assert_eq!(id.short(8), "01234567");
    }

    #[test]
    fn short_is_noop_when_shorter_than_n() {
        let id = ProcessName::new("abc");
        assert_eq!(id.short(8), "abc");
    }

    #[test]
    fn sequential_id_gen_is_deterministic() {
        let gen = SequentialIdGen::new("proc");
        assert_eq!(gen.next(), "proc-0");
        assert_eq!(gen.next(), "proc-1");
    }

    #[test]
    fn uuid_id_gen_produces_distinct_ids() {
        let gen = UuidIdGen;
        assert_ne!(gen.next(), gen.next());
    }
}
