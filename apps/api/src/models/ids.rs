//! Typed identifiers for every entity owned by a course session.
//!
//! Each id is a transparent newtype so a `TopicId` can never be passed where a
//! `TaskId` is expected, while the wire and database representation stays a
//! plain UUID.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(CourseId);
uuid_id!(
    /// One lesson/class period within a course.
    SessionId
);
uuid_id!(TopicId);
uuid_id!(ObjectiveId);
uuid_id!(TaskId);
uuid_id!(
    /// A card instance dropped into a task area (not the media-library card).
    CardId
);
uuid_id!(PageId);

/// Reference to a card in the external media library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaCardId(pub String);

impl fmt::Display for MediaCardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_bare_uuid() {
        let raw = Uuid::new_v4();
        let id = TopicId(raw);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{raw}\""));
        let back: TopicId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_new_ids_are_distinct() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_media_card_id_is_transparent_string() {
        let id: MediaCardId = serde_json::from_str("\"card-42\"").unwrap();
        assert_eq!(id.to_string(), "card-42");
    }
}
