//! The trait implemented by every handle type built with
//! [`variant_set!`](crate::variant_set).

use core::fmt::Debug;
use core::hash::Hash;

/// A closed set of element types behind one discriminated handle.
///
/// Implemented by the macro, never by hand. The associated items expose the
/// build-time artifacts of the set: its diagnostic label, its cardinality,
/// and its tag enumeration. The tag-to-element-type mapping is a bijection
/// by construction: there are exactly [`LEN`](Self::LEN) tags, one per
/// element type, in declaration order.
///
/// There is no retag operation. A handle keeps the tag it was created with;
/// holding a different element type means building a new handle through
/// [`From`] or `new`.
pub trait VariantSet: Sized {
    /// Diagnostic label given at definition time (`as "label"`), used in
    /// error messages. Defaults to the handle type's identifier.
    const NAME: &'static str;

    /// Number of element types in the set.
    const LEN: usize;

    /// The tag enumeration: one unit variant per element type, named after
    /// the element type's short name.
    type Tag: Copy + Eq + Debug + Hash + 'static;

    /// Tag of the currently active variant.
    fn tag(&self) -> Self::Tag;
}
