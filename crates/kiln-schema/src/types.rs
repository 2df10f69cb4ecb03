//! Newtype wrappers for manifest identifiers.
//!
//! All newtypes serialize/deserialize as plain strings so they can be embedded
//! in JSON output and lookup tables without conversion.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Dotted module identifier such as `lang.bun`, unique within a manifest.
    ModuleId
);

string_newtype!(
    /// Grouping label that decides which installer artifact a module lands in.
    Category
);

string_newtype!(
    /// Lowercase hex SHA-256 digest of the raw manifest bytes.
    Fingerprint
);

impl ModuleId {
    /// Substring before the first dot, or the whole id when it has no dot.
    pub fn category_prefix(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(head, _)| head)
    }

    /// Name of the generated bash install function for this module.
    ///
    /// Never stored; recomputed on demand so every artifact agrees on it.
    pub fn install_function(&self) -> String {
        let mut name = String::with_capacity(self.0.len() + 8);
        name.push_str("install_");
        for c in self.0.chars() {
            name.push(if c == '.' || c == '-' { '_' } else { c });
        }
        name
    }
}

impl Fingerprint {
    /// Truncated 12-character prefix, used for display.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

/// Check that `segment` is a non-empty run of `[A-Za-z0-9_-]`.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Check that `id` is one or more valid segments joined by dots.
pub fn is_valid_module_id(id: &str) -> bool {
    !id.is_empty() && id.split('.').all(is_valid_segment)
}
