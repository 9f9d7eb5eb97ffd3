//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two event
/// descriptions with the same title, venue and slot are the same description,
/// whichever event carries them. To "modify" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Venue {
///     hall: String,
///     city: String,
/// }
///
/// impl ValueObject for Venue {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
