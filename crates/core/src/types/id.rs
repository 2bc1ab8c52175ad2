//! Newtype IDs for type-safe entity references.
//!
//! Every entity id is a 26-character string: 128 random bits encoded with a
//! lowercase base32 alphabet. Use the `define_id!` macro to create type-safe
//! wrappers that prevent accidentally mixing ids from different entity types.

use uuid::Uuid;

/// Length of a generated id.
pub const ID_LENGTH: usize = 26;

/// Base32 alphabet used for ids (lowercase, no ambiguous padding).
const ENCODING: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

/// Generate a new random 26-character id.
///
/// # Example
///
/// ```rust
/// # use postaction_core::new_id;
/// let id = new_id();
/// assert_eq!(id.len(), 26);
/// ```
#[must_use]
pub fn new_id() -> String {
    encode_base32(Uuid::new_v4().as_bytes())
}

/// Returns `true` if `id` looks like an id produced by [`new_id`].
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn encode_base32(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(alphabet_char((buffer >> bits) & 0x1f));
        }
    }

    if bits > 0 {
        out.push(alphabet_char((buffer << (5 - bits)) & 0x1f));
    }

    out
}

fn alphabet_char(index: u32) -> char {
    // index is masked to five bits by every caller
    ENCODING
        .get(index as usize)
        .map_or('y', |&b| char::from(b))
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Default`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `generate()`, `as_str()`, `is_valid()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use postaction_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::generate();
/// assert!(widget.is_valid());
///
/// // These are different types, so this won't compile:
/// // let _: GadgetId = widget;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self($crate::new_id())
            }

            /// Get the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the id is empty.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Returns `true` if the id has the shape of a generated id.
            #[must_use]
            pub fn is_valid(&self) -> bool {
                $crate::is_valid_id(&self.0)
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(PostId);
define_id!(ChannelId);
define_id!(TeamId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_length_and_charset() {
        for _ in 0..64 {
            let id = new_id();
            assert_eq!(id.len(), ID_LENGTH);
            assert!(id.bytes().all(|b| ENCODING.contains(&b)), "unexpected char in {id}");
        }
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn test_encode_base32_known_values() {
        assert_eq!(encode_base32(&[0u8; 16]), "y".repeat(26));
        // 0xff.. encodes to the last alphabet character, final 3 padding bits are zero
        let encoded = encode_base32(&[0xffu8; 16]);
        assert_eq!(encoded.len(), 26);
        assert!(encoded.starts_with("9999"));
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id(&new_id()));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("short"));
        assert!(!is_valid_id("abcdefghijklmnopqrstuvwxy!"));
    }

    #[test]
    fn test_typed_ids() {
        let post = PostId::generate();
        assert!(post.is_valid());
        assert_eq!(post.to_string(), post.as_str());

        let user = UserId::from("u1");
        assert!(!user.is_valid());
        assert_eq!(String::from(user), "u1");

        assert!(ChannelId::default().is_empty());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = TeamId::new("team");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"team\""));
    }
}
