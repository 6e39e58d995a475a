//! Capability traits for conditional fields.
//!
//! Conditional (`maybe_*`) access dispatches through an explicit capability
//! trait: element types that support the operation or field implement the
//! trait, the rest do not, and the handle resolves presence per variant at
//! compile time. For conditional operations the capability trait is
//! ordinary and hand-written; for conditional fields the two macros here
//! remove the accessor boilerplate.
//!
//! ```
//! use varset::{field_capability, expose_field};
//!
//! struct Orc { hp: u32, mana: u32 }
//!
//! field_capability! {
//!     /// Mana pool, for element types that can cast.
//!     pub trait ManaPool { mana: u32 }
//! }
//!
//! expose_field! { ManaPool { mana: u32 } for Orc }
//!
//! let mut orc = Orc { hp: 20, mana: 50 };
//! *ManaPool::get_mut(&mut orc) += 5;
//! assert_eq!(*ManaPool::get(&orc), 55);
//! # let _ = orc.hp;
//! ```

/// Declares a field-capability trait: a `get`/`get_mut` accessor pair over
/// one named field.
///
/// The accessor names are fixed so that `maybe_fields` dispatch can invoke
/// them without knowing the field name; the field identifier in the braces
/// documents which field the trait stands for.
#[macro_export]
macro_rules! field_capability {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident { $field:ident: $ty:ty }
    ) => {
        $(#[$meta])*
        $vis trait $name {
            #[doc = ::core::concat!(
                "Shared reference to the `", ::core::stringify!($field), "` field."
            )]
            fn get(&self) -> &$ty;

            #[doc = ::core::concat!(
                "Mutable reference to the `", ::core::stringify!($field), "` field."
            )]
            fn get_mut(&mut self) -> &mut $ty;
        }
    };
}

/// Implements a [`field_capability!`] trait for a concrete element type by
/// forwarding to the named field.
#[macro_export]
macro_rules! expose_field {
    ($cap:path { $field:ident: $ty:ty } for $target:ty) => {
        impl $cap for $target {
            fn get(&self) -> &$ty {
                &self.$field
            }

            fn get_mut(&mut self) -> &mut $ty {
                &mut self.$field
            }
        }
    };
}
