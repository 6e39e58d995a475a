//! Procedural macros for varset variant sets
//!
//! This crate provides the `variant_set!` function-like macro for building
//! a closed, duplicate-free set of element types behind one enum handle.

extern crate proc_macro;

use proc_macro::TokenStream;

mod variant_set;

/// Build a closed variant set.
///
/// Takes an enum-like declaration listing the element types of the set and
/// the operations and fields the handle should expose, and generates the
/// tag enumeration, the handle enum, and statically dispatched accessors.
///
/// # Example
///
/// ```ignore
/// variant_set! {
///     pub enum Creature as "creatures" {
///         variants: [Orc, Troll],
///         calls: {
///             fn heal(&mut self, amount: u32);
///             fn health(&self) -> u32;
///         },
///         maybe_calls: {
///             fn cast(&mut self, cost: u32) -> u32 via Caster;
///         },
///         fields: { hp: u32 },
///         maybe_fields: { mana: u32 via ManaPool },
///     }
/// }
/// ```
///
/// This generates:
/// - Tag enum `CreatureTag` (one entry per element type, declaration
///   order, minimal backing width) with `ALL` and `name()`
/// - Handle enum `Creature` with one case per element type
/// - `From<T> for Creature` per element type plus `Creature::new`
/// - `varset::VariantSet` and per-element `varset::Variant` impls
/// - One inherent method per declared operation and field accessor; the
///   `maybe_*` forms return `Option` and resolve presence through the
///   named capability trait
///
/// # Sections
///
/// - `variants` (required): ordered, duplicate-free list of element types.
///   A reference element type (`&T` / `&mut T`) dispatches on its pointee.
/// - `calls`: operations required on every element type, same signature.
/// - `maybe_calls`: operations on a subset of element types; each names
///   its capability trait with `via Trait`.
/// - `fields`: fields required on every element type, same type.
/// - `maybe_fields`: fields on a subset; each names a
///   `varset::field_capability!` trait with `via Trait`.
///
/// # Errors
///
/// Duplicate element types, tag-name collisions between distinct element
/// types, and malformed sections are compile errors naming the set's
/// diagnostic label. Operations or fields not uniformly available fail to
/// compile at the generated dispatch arm, naming the offending element
/// type.
#[proc_macro]
pub fn variant_set(input: TokenStream) -> TokenStream {
    variant_set::variant_set_impl(input)
}
