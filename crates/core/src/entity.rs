//! Entity trait: identity + continuity across state changes.
//!
//! Products and reservations are entities — a product stays the same product
//! while its availability flips between free, held and sold.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
