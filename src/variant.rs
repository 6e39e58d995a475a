//! Typed insertion and extraction of element values.
//!
//! `impl Variant<S> for T` defines the unique embedding of element type `T`
//! in handle type `S`. For
//!
//! ```ignore
//! variant_set! {
//!     pub enum Creature {
//!         variants: [Orc, Troll],
//!     }
//! }
//! ```
//!
//! the macro implements `Variant<Creature>` for `Orc` and `Troll`, so that
//! `orc.insert()` wraps a value and `Orc::extract(creature)` unwraps it
//! again, with `T::extract(t.insert()) == t` for every element value.
//!
//! The checked accessors (`extract`, `peek`, `peek_mut`) are the default;
//! a wrong assumption about the active tag is reported through the return
//! channel, never as a panic. The unchecked fast paths exist for callers
//! that have already branched on the tag and are `unsafe` to opt into.

use thiserror::Error;

use crate::VariantSet;

/// Checked extraction failed: the handle's active tag did not correspond to
/// the requested element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("variant set `{set}` holds `{actual}`, not the requested element type")]
pub struct BadVariantError {
    set: &'static str,
    actual: &'static str,
}

impl BadVariantError {
    /// Called from macro-generated `Variant` impls.
    #[doc(hidden)]
    pub fn new(set: &'static str, actual: &'static str) -> Self {
        Self { set, actual }
    }

    /// Diagnostic label of the set the extraction was attempted on.
    pub fn set(&self) -> &'static str {
        self.set
    }

    /// Tag name of the variant the handle actually held.
    pub fn actual(&self) -> &'static str {
        self.actual
    }
}

/// An element type of the variant set `Set`.
///
/// Implemented by [`variant_set!`](crate::variant_set) for every element
/// type it is given. The handle type exposes generic conveniences
/// (`get`, `get_mut`, `try_extract`, `get_unchecked`) that forward here, so
/// this trait is mostly interacted with through bounds.
pub trait Variant<Set: VariantSet>: Sized {
    /// Wraps an element value in the case of `Set` tagged with this type.
    fn insert(self) -> Set;

    /// Destructs the handle, expecting this element type to be active.
    fn extract(set: Set) -> Result<Self, BadVariantError>;

    /// Shared reference to the payload if this element type is active.
    fn peek(set: &Set) -> Option<&Self>;

    /// Mutable reference to the payload if this element type is active.
    fn peek_mut(set: &mut Set) -> Option<&mut Self>;

    /// Unchecked shared access to the payload.
    ///
    /// # Safety
    ///
    /// The handle's active tag must correspond to this element type;
    /// otherwise the behavior is undefined.
    unsafe fn peek_unchecked(set: &Set) -> &Self;

    /// Unchecked mutable access to the payload.
    ///
    /// # Safety
    ///
    /// The handle's active tag must correspond to this element type;
    /// otherwise the behavior is undefined.
    unsafe fn peek_unchecked_mut(set: &mut Set) -> &mut Self;
}
