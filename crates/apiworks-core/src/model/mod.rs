//! # Entity Models
//!
//! Model form of every entity kind in a workspace. These are the types the
//! exporter, importer, filter and API layers work with; the row form used
//! for storage lives in [`crate::mapper`].
//!
//! Enumerations carry a stable integer code (their row encoding) and a
//! lower_snake_case text name (their bundle encoding).

pub mod collection;
pub mod credential;
pub mod environment;
pub mod file;
pub mod flow;
pub mod http;
pub mod workspace;

pub use collection::{
    Collection, Endpoint, Example, ExampleAssert, ExampleBodyRaw, ExampleKeyValue, Folder,
    Response, ResponseAssert, ResponseHeader,
};
pub use credential::{Credential, CredentialKind, CredentialSecret};
pub use environment::{Environment, Variable};
pub use file::{File, FileKind};
pub use flow::{
    AiMemoryNode, AiModel, AiNode, AiProviderNode, Condition, ConditionNode, Edge, EdgeHandle,
    EdgeKind, ErrorHandling, Flow, FlowVariable, ForEachNode, ForNode, JsNode, MemoryType, Node,
    NodeKind, NodePayload, NoopKind, NoopNode, RequestNode,
};
pub use http::{Http, HttpAssert, HttpBodyRaw, HttpKeyValue};
pub use workspace::{Workspace, WorkspaceRole, WorkspaceUser};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UNIX time in seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Declare a fieldless enum with a stable row code and a text name.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Row encoding.
            #[must_use]
            pub const fn code(self) -> i32 {
                match self {
                    $( Self::$variant => $code ),+
                }
            }

            /// Text encoding.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl TryFrom<i32> for $name {
            type Error = crate::mapper::MapperError;

            fn try_from(code: i32) -> Result<Self, Self::Error> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    other => Err(crate::mapper::MapperError::UnknownCode {
                        kind: stringify!($name),
                        code: other,
                    }),
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::mapper::MapperError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(crate::mapper::MapperError::UnknownName {
                        kind: stringify!($name),
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use coded_enum;

coded_enum! {
    /// Body encoding of an example or HTTP request.
    pub enum BodyKind {
        #[default]
        None = 0 => "none",
        Raw = 1 => "raw",
        Form = 2 => "form",
        UrlEncoded = 3 => "urlencoded",
    }
}

coded_enum! {
    /// How a raw body is rendered by clients.
    pub enum VisualizeMode {
        #[default]
        Undefined = 0 => "undefined",
        Json = 1 => "json",
        Html = 2 => "html",
        Xml = 3 => "xml",
        Text = 4 => "text",
        Binary = 5 => "binary",
    }
}

coded_enum! {
    /// Compression applied to stored body bytes.
    pub enum CompressType {
        #[default]
        None = 0 => "none",
        Zstd = 1 => "zstd",
    }
}

/// Serde adapter for byte fields: base64 text in human-readable formats,
/// raw bytes otherwise.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&STANDARD.encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub(crate) struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bytes or a base64 string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Vec<u8>, E> {
            STANDARD.decode(v).map_err(E::custom)
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
            Ok(v)
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<u8>, A::Error> {
            let mut out = Vec::new();
            while let Some(byte) = seq.next_element::<u8>()? {
                out.push(byte);
            }
            Ok(out)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(BytesVisitor)
        } else {
            deserializer.deserialize_byte_buf(BytesVisitor)
        }
    }
}

/// [`base64_bytes`] for optional byte fields.
pub(crate) mod base64_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::base64_bytes")] Vec<u8>);

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&Borrowed(bytes)),
            None => serializer.serialize_none(),
        }
    }

    struct Borrowed<'a>(&'a [u8]);

    impl serde::Serialize for Borrowed<'_> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            super::base64_bytes::serialize(self.0, serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|w| w.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_enum_round_trips_codes_and_names() {
        for kind in [BodyKind::None, BodyKind::Raw, BodyKind::Form, BodyKind::UrlEncoded] {
            assert_eq!(BodyKind::try_from(kind.code()).expect("code"), kind);
            assert_eq!(kind.as_str().parse::<BodyKind>().expect("name"), kind);
        }
        assert!(BodyKind::try_from(42).is_err());
        assert!("multipart".parse::<BodyKind>().is_err());
    }

    #[test]
    fn coded_enum_serializes_by_name() {
        assert_eq!(serde_json::to_string(&VisualizeMode::Json).expect("json"), "\"json\"");
        assert_eq!(
            serde_json::from_str::<CompressType>("\"zstd\"").expect("parse"),
            CompressType::Zstd
        );
    }

    #[test]
    fn unix_now_is_positive() {
        assert!(unix_now() > 1_600_000_000);
    }
}
