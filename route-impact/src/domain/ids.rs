//! Feed identifier types.

use std::fmt;
use std::sync::Arc;

/// Declares a cheaply clonable string identifier from the static feed.
///
/// Identifiers are opaque: the feed assigns them and we never interpret their
/// contents. They are shared (`Arc<str>`) because the same id is repeated on
/// every segment and grid entry derived from it.
macro_rules! feed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create an identifier from its feed value.
            pub fn new(id: impl AsRef<str>) -> Self {
                Self(Arc::from(id.as_ref()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

feed_id!(
    /// A `route_id` from `routes.txt`.
    RouteId
);

feed_id!(
    /// A `stop_id` from `stops.txt`.
    StopId
);

feed_id!(
    /// A `shape_id` from `shapes.txt`.
    ShapeId
);

feed_id!(
    /// A `trip_id` from `trips.txt`.
    TripId
);
