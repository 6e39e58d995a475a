//! Trait-level API tests: Variant insertion/extraction and VariantSet
//! build-time artifacts, exercised the way a consumer crate would.

use pretty_assertions::assert_eq;
use static_assertions::{assert_eq_size, assert_impl_all};
use varset::{BadVariantError, Variant, VariantSet, variant_set};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Scalar(i64);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Text(String);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Flag(bool);

variant_set! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Constant as "constants" {
        variants: [Scalar, Text, Flag],
    }
}

// Three element types fit in the narrowest backing width.
assert_eq_size!(ConstantTag, u8);
assert_impl_all!(ConstantTag: Copy, Eq, core::hash::Hash, core::fmt::Debug);
assert_impl_all!(Constant: VariantSet);
assert_impl_all!(Scalar: Variant<Constant>);
assert_impl_all!(BadVariantError: std::error::Error, Copy);

#[test]
fn tags_are_a_bijection_in_declaration_order() {
    assert_eq!(Constant::LEN, 3);
    assert_eq!(ConstantTag::ALL.len(), Constant::LEN);
    assert_eq!(
        ConstantTag::ALL,
        [ConstantTag::Scalar, ConstantTag::Text, ConstantTag::Flag]
    );
    let names: Vec<&str> = ConstantTag::ALL.iter().map(|tag| tag.name()).collect();
    assert_eq!(names, vec!["Scalar", "Text", "Flag"]);
}

#[test]
fn insert_then_extract_is_identity() {
    let original = Text("hello".to_owned());
    let handle = original.clone().insert();
    assert_eq!(handle.tag(), ConstantTag::Text);
    assert_eq!(Text::extract(handle), Ok(original));
}

#[test]
fn extract_reports_the_actual_tag_on_mismatch() {
    let handle = Constant::new(Scalar(42));
    let err = Flag::extract(handle).unwrap_err();
    assert_eq!(err.set(), "constants");
    assert_eq!(err.actual(), "Scalar");
    assert_eq!(
        err.to_string(),
        "variant set `constants` holds `Scalar`, not the requested element type"
    );
}

#[test]
fn peek_is_tag_sensitive() {
    let mut handle = Constant::new(Flag(false));
    assert_eq!(Flag::peek(&handle), Some(&Flag(false)));
    assert_eq!(Scalar::peek(&handle), None);

    if let Some(flag) = Flag::peek_mut(&mut handle) {
        flag.0 = true;
    }
    assert_eq!(handle, Constant::Flag(Flag(true)));
}

#[test]
fn handle_methods_forward_to_the_variant_impls() {
    let handle = Constant::new(Scalar(7));
    assert_eq!(handle.get::<Scalar>(), Some(&Scalar(7)));
    assert_eq!(handle.get::<Text>(), None);
    assert_eq!(handle.try_extract::<Scalar>(), Ok(Scalar(7)));
}

#[test]
fn tags_key_collections() {
    use std::collections::HashMap;

    let constants = [
        Constant::new(Scalar(1)),
        Constant::new(Text("a".to_owned())),
        Constant::new(Scalar(2)),
    ];
    let mut by_tag: HashMap<ConstantTag, usize> = HashMap::new();
    for constant in &constants {
        *by_tag.entry(constant.tag()).or_default() += 1;
    }
    assert_eq!(by_tag[&ConstantTag::Scalar], 2);
    assert_eq!(by_tag[&ConstantTag::Text], 1);
    assert!(!by_tag.contains_key(&ConstantTag::Flag));
}

#[test]
fn direct_match_on_the_handle_still_works() {
    let handle = Constant::new(Text("direct".to_owned()));
    let text = match handle {
        Constant::Text(text) => text.0,
        other => panic!("unexpected variant {other:?}"),
    };
    assert_eq!(text, "direct");
}
