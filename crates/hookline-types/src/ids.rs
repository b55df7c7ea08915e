//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Emitting objects and signal listeners each get their own newtype so an
//! object id can never be passed where a listener id is expected. New ids
//! use UUID v7 so ids minted in one session sort by creation time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identity of an emitting object owned by the world.
    ///
    /// Also used for the intermediate hops of a trace path (network
    /// components a listener was discovered through).
    ObjectId
}

define_id! {
    /// Identity of a signal listener on the scripting side.
    ListenerId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn ids_are_time_ordered() {
        let first = ListenerId::new();
        let second = ListenerId::new();
        assert!(first <= second);
    }

    #[test]
    fn id_survives_json() {
        let original = ObjectId::new();
        let json = serde_json::to_string(&original).ok();
        let restored: Option<ObjectId> = json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        assert_eq!(restored, Some(original));
    }

    #[test]
    fn display_matches_uuid() {
        let id = ListenerId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
