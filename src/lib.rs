//! Varset - closed variant sets with compile-time-checked dispatch
//!
//! # Overview
//!
//! A variant set is a fixed, duplicate-free list of element types stored
//! behind a single enum (the "handle"). The [`variant_set!`] macro builds
//! the handle enum, a matching tag enumeration, and a family of accessors
//! that operate on whichever variant is currently active without an
//! explicit `match` at every call site:
//!
//! - uniform operations (`calls`) and fields (`fields`), required to exist
//!   with the same signature on every element type, checked at compile
//!   time;
//! - conditional operations (`maybe_calls`) and fields (`maybe_fields`),
//!   allowed on a subset of element types and declared through an explicit
//!   capability trait, yielding `Option` at the handle;
//! - typed extraction of the active payload, checked by default
//!   ([`Variant::peek`] / [`Variant::extract`]) with an explicitly `unsafe`
//!   unchecked fast path.
//!
//! No trait objects, heap allocation, or runtime reflection are involved:
//! every accessor compiles down to one `match` over the handle.
//!
//! # Quick Start
//!
//! ```
//! use varset::variant_set;
//!
//! struct Orc { hp: u32 }
//! impl Orc {
//!     fn heal(&mut self, amount: u32) { self.hp += amount; }
//!     fn health(&self) -> u32 { self.hp }
//! }
//!
//! struct Troll { hp: u32 }
//! impl Troll {
//!     // Trolls regenerate: healing counts double.
//!     fn heal(&mut self, amount: u32) { self.hp += 2 * amount; }
//!     fn health(&self) -> u32 { self.hp }
//! }
//!
//! variant_set! {
//!     pub enum Creature as "creatures" {
//!         variants: [Orc, Troll],
//!         calls: {
//!             fn heal(&mut self, amount: u32);
//!             fn health(&self) -> u32;
//!         },
//!         fields: { hp: u32 },
//!     }
//! }
//!
//! let mut c = Creature::new(Orc { hp: 20 });
//! c.heal(5);
//! assert_eq!(c.health(), 25);
//! assert_eq!(c.tag(), CreatureTag::Orc);
//!
//! // Direct structural access stays first-class.
//! match &c {
//!     Creature::Orc(orc) => assert_eq!(orc.hp, 25),
//!     Creature::Troll(_) => unreachable!(),
//! }
//! ```
//!
//! # Build-time failure modes
//!
//! Everything that can go wrong with a set definition goes wrong at compile
//! time. Listing the same element type twice is rejected while the set is
//! built:
//!
//! ```compile_fail
//! use varset::variant_set;
//!
//! struct Orc;
//!
//! variant_set! {
//!     pub enum Creature {
//!         variants: [Orc, Orc],
//!     }
//! }
//! ```
//!
//! Initializing a handle from a type that is not a member of the set is a
//! type error, not a runtime branch:
//!
//! ```compile_fail
//! use varset::variant_set;
//!
//! struct Orc;
//! struct Goblin;
//!
//! variant_set! {
//!     pub enum Creature {
//!         variants: [Orc],
//!     }
//! }
//!
//! let c = Creature::new(Goblin);
//! ```
//!
//! And a uniform operation missing on any one element type fails to build,
//! naming the type and the operation:
//!
//! ```compile_fail
//! use varset::variant_set;
//!
//! struct Orc;
//! impl Orc {
//!     fn roar(&self) {}
//! }
//! struct Troll;
//!
//! variant_set! {
//!     pub enum Creature {
//!         variants: [Orc, Troll],
//!         calls: {
//!             fn roar(&self);
//!         },
//!     }
//! }
//! ```

pub mod capability;
pub mod set;
pub mod variant;

pub use set::VariantSet;
pub use variant::{BadVariantError, Variant};
pub use varset_macros::variant_set;
