//! Implementation of the `variant_set!` macro

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{ToTokens, format_ident, quote, quote_spanned};
use syn::{
    Attribute, FnArg, Generics, Ident, LitStr, Pat, PatType, Path, Token, Type, Visibility, braced,
    bracketed, parenthesized,
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
};

mod kw {
    syn::custom_keyword!(variants);
    syn::custom_keyword!(calls);
    syn::custom_keyword!(maybe_calls);
    syn::custom_keyword!(fields);
    syn::custom_keyword!(maybe_fields);
    syn::custom_keyword!(via);
}

pub fn variant_set_impl(input: TokenStream) -> TokenStream {
    let def = parse_macro_input!(input as SetDef);
    expand(&def).into()
}

/// Parsed form of one `variant_set!` invocation.
#[derive(Debug)]
struct SetDef {
    attrs: Vec<Attribute>,
    vis: Visibility,
    ident: Ident,
    generics: Generics,
    /// Diagnostic label (`as "label"`, defaulting to the enum identifier).
    label: String,
    elems: Vec<ElemType>,
    calls: Vec<OpDecl>,
    maybe_calls: Vec<OpDecl>,
    fields: Vec<FieldDecl>,
    maybe_fields: Vec<FieldDecl>,
}

/// One element type of the set.
#[derive(Debug)]
struct ElemType {
    /// The type as written in the `variants` list.
    ty: Type,
    /// The operation-bearing type: the pointee for reference element types,
    /// the type itself otherwise.
    target: Type,
    by_ref: bool,
    /// Whether the payload supports mutable access to the target. False for
    /// shared-reference element types, where `&mut` through the payload is
    /// impossible.
    mutable: bool,
    /// Tag identifier, the last path segment of `target`.
    tag: Ident,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RecvKind {
    Shared,
    Mut,
    Owned,
}

/// A `fn name(receiver, args…) -> Ret [via Trait];` declaration from a
/// `calls` or `maybe_calls` section.
#[derive(Debug)]
struct OpDecl {
    name: Ident,
    recv: RecvKind,
    params: Vec<(Ident, Type)>,
    ret: Option<Type>,
    via: Option<Path>,
}

/// A `name: Type [via Trait]` declaration from a `fields` or
/// `maybe_fields` section.
#[derive(Debug)]
struct FieldDecl {
    name: Ident,
    ty: Type,
    via: Option<Path>,
}

impl ElemType {
    fn from_type(ty: Type) -> syn::Result<Self> {
        let mut target = &ty;
        let mut by_ref = false;
        let mut mutable = true;
        while let Type::Reference(reference) = target {
            by_ref = true;
            mutable = mutable && reference.mutability.is_some();
            target = &reference.elem;
        }
        let tag = match target {
            Type::Path(path) => match path.path.segments.last() {
                Some(segment) => segment.ident.clone(),
                None => {
                    return Err(syn::Error::new_spanned(
                        &ty,
                        "cannot derive a tag name for this element type",
                    ));
                }
            },
            _ => {
                return Err(syn::Error::new_spanned(
                    &ty,
                    "cannot derive a tag name for this element type; use a named type",
                ));
            }
        };
        let target = target.clone();
        Ok(ElemType {
            ty,
            target,
            by_ref,
            mutable,
            tag,
        })
    }
}

impl Parse for SetDef {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        input.parse::<Token![enum]>()?;
        let ident: Ident = input.parse()?;
        let generics: Generics = input.parse()?;
        let label = if input.peek(Token![as]) {
            input.parse::<Token![as]>()?;
            input.parse::<LitStr>()?.value()
        } else {
            ident.to_string()
        };

        let body;
        braced!(body in input);

        let mut elems: Option<Vec<ElemType>> = None;
        let mut calls = Vec::new();
        let mut maybe_calls = Vec::new();
        let mut fields = Vec::new();
        let mut maybe_fields = Vec::new();

        while !body.is_empty() {
            if body.peek(kw::variants) {
                let keyword = body.parse::<kw::variants>()?;
                if elems.is_some() {
                    return Err(syn::Error::new(keyword.span, "duplicate `variants` section"));
                }
                body.parse::<Token![:]>()?;
                let list;
                bracketed!(list in body);
                let types = Punctuated::<Type, Token![,]>::parse_terminated(&list)?;
                let mut parsed = Vec::new();
                for ty in types {
                    parsed.push(ElemType::from_type(ty)?);
                }
                elems = Some(parsed);
            } else if body.peek(kw::calls) {
                body.parse::<kw::calls>()?;
                body.parse::<Token![:]>()?;
                parse_ops(&body, &mut calls)?;
            } else if body.peek(kw::maybe_calls) {
                body.parse::<kw::maybe_calls>()?;
                body.parse::<Token![:]>()?;
                parse_ops(&body, &mut maybe_calls)?;
            } else if body.peek(kw::fields) {
                body.parse::<kw::fields>()?;
                body.parse::<Token![:]>()?;
                parse_fields(&body, &mut fields)?;
            } else if body.peek(kw::maybe_fields) {
                body.parse::<kw::maybe_fields>()?;
                body.parse::<Token![:]>()?;
                parse_fields(&body, &mut maybe_fields)?;
            } else {
                return Err(body.error(
                    "expected one of `variants`, `calls`, `maybe_calls`, `fields`, `maybe_fields`",
                ));
            }
            if body.peek(Token![,]) {
                body.parse::<Token![,]>()?;
            }
        }

        let elems = elems.ok_or_else(|| {
            syn::Error::new(
                ident.span(),
                format!("variant set `{label}` has no `variants` section"),
            )
        })?;

        let def = SetDef {
            attrs,
            vis,
            ident,
            generics,
            label,
            elems,
            calls,
            maybe_calls,
            fields,
            maybe_fields,
        };
        validate(&def)?;
        Ok(def)
    }
}

fn parse_ops(body: ParseStream, out: &mut Vec<OpDecl>) -> syn::Result<()> {
    let content;
    braced!(content in body);
    while !content.is_empty() {
        out.push(content.parse::<OpDecl>()?);
    }
    Ok(())
}

fn parse_fields(body: ParseStream, out: &mut Vec<FieldDecl>) -> syn::Result<()> {
    let content;
    braced!(content in body);
    let decls = Punctuated::<FieldDecl, Token![,]>::parse_terminated(&content)?;
    out.extend(decls);
    Ok(())
}

impl Parse for OpDecl {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        input.parse::<Token![fn]>()?;
        let name: Ident = input.parse()?;
        let content;
        parenthesized!(content in input);
        let args = Punctuated::<FnArg, Token![,]>::parse_terminated(&content)?;

        let mut args = args.into_iter();
        let recv = match args.next() {
            Some(FnArg::Receiver(receiver)) => {
                if receiver.colon_token.is_some() {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "arbitrary self types are not supported",
                    ));
                }
                match (&receiver.reference, &receiver.mutability) {
                    (None, _) => RecvKind::Owned,
                    (Some(_), None) => RecvKind::Shared,
                    (Some(_), Some(_)) => RecvKind::Mut,
                }
            }
            Some(other) => {
                return Err(syn::Error::new_spanned(
                    other,
                    "the first parameter must be a `self` receiver",
                ));
            }
            None => {
                return Err(syn::Error::new(
                    name.span(),
                    "an operation needs a `self` receiver",
                ));
            }
        };

        let mut params = Vec::new();
        for arg in args {
            match arg {
                FnArg::Typed(PatType { pat, ty, .. }) => match *pat {
                    Pat::Ident(pat) => params.push((pat.ident, *ty)),
                    other => {
                        return Err(syn::Error::new_spanned(
                            other,
                            "expected a plain identifier parameter",
                        ));
                    }
                },
                FnArg::Receiver(receiver) => {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "the receiver must come first",
                    ));
                }
            }
        }

        let ret = if input.peek(Token![->]) {
            input.parse::<Token![->]>()?;
            Some(input.parse::<Type>()?)
        } else {
            None
        };

        let via = if input.peek(kw::via) {
            input.parse::<kw::via>()?;
            Some(input.parse::<Path>()?)
        } else {
            None
        };

        input.parse::<Token![;]>()?;
        Ok(OpDecl {
            name,
            recv,
            params,
            ret,
            via,
        })
    }
}

impl Parse for FieldDecl {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: Ident = input.parse()?;
        input.parse::<Token![:]>()?;
        let ty: Type = input.parse()?;
        let via = if input.peek(kw::via) {
            input.parse::<kw::via>()?;
            Some(input.parse::<Path>()?)
        } else {
            None
        };
        Ok(FieldDecl { name, ty, via })
    }
}

/// Handle methods the macro always generates; user-declared operations and
/// fields may not shadow them.
const RESERVED: &[&str] = &[
    "new",
    "tag",
    "get",
    "get_mut",
    "try_extract",
    "get_unchecked",
    "get_unchecked_mut",
];

fn validate(def: &SetDef) -> syn::Result<()> {
    if def.elems.is_empty() {
        return Err(syn::Error::new(
            def.ident.span(),
            format!(
                "variant set `{}` needs at least one element type",
                def.label
            ),
        ));
    }
    if def.elems.len() > usize::from(u16::MAX) {
        return Err(syn::Error::new(
            def.ident.span(),
            format!("variant set `{}` has too many element types", def.label),
        ));
    }

    for (i, elem) in def.elems.iter().enumerate() {
        for prior in &def.elems[..i] {
            if type_repr(&elem.ty) == type_repr(&prior.ty) {
                return Err(syn::Error::new_spanned(
                    &elem.ty,
                    format!(
                        "duplicate element type `{}` in variant set `{}`",
                        type_repr(&elem.ty),
                        def.label
                    ),
                ));
            }
            if elem.tag == prior.tag {
                return Err(syn::Error::new_spanned(
                    &elem.ty,
                    format!(
                        "element types `{}` and `{}` in variant set `{}` would share tag name `{}`",
                        type_repr(&prior.ty),
                        type_repr(&elem.ty),
                        def.label,
                        elem.tag
                    ),
                ));
            }
        }
    }

    for op in &def.calls {
        if let Some(via) = &op.via {
            return Err(syn::Error::new_spanned(
                via,
                "`calls` operations are uniform; `via` only applies to `maybe_calls`",
            ));
        }
    }
    for op in &def.maybe_calls {
        if op.via.is_none() {
            return Err(syn::Error::new(
                op.name.span(),
                format!(
                    "conditional operation `{}` needs a `via` capability trait",
                    op.name
                ),
            ));
        }
        if op.recv == RecvKind::Owned {
            return Err(syn::Error::new(
                op.name.span(),
                "conditional operations dispatch through a reference; use `&self` or `&mut self`",
            ));
        }
    }
    for field in &def.fields {
        if let Some(via) = &field.via {
            return Err(syn::Error::new_spanned(
                via,
                "`fields` entries are uniform; `via` only applies to `maybe_fields`",
            ));
        }
    }
    for field in &def.maybe_fields {
        if field.via.is_none() {
            return Err(syn::Error::new(
                field.name.span(),
                format!(
                    "conditional field `{}` needs a `via` capability trait",
                    field.name
                ),
            ));
        }
    }

    // Every declared operation and field accessor becomes an inherent
    // method; catch clashes here rather than as opaque rustc duplicates.
    let mut names: Vec<(String, Span)> = Vec::new();
    for op in def.calls.iter().chain(&def.maybe_calls) {
        names.push((op.name.to_string(), op.name.span()));
    }
    for field in def.fields.iter().chain(&def.maybe_fields) {
        names.push((field.name.to_string(), field.name.span()));
        names.push((format!("{}_ref", field.name), field.name.span()));
        names.push((format!("{}_mut", field.name), field.name.span()));
    }
    for (i, (name, span)) in names.iter().enumerate() {
        if RESERVED.contains(&name.as_str()) {
            return Err(syn::Error::new(
                *span,
                format!("`{name}` collides with a built-in handle method"),
            ));
        }
        if names[..i].iter().any(|(prior, _)| prior == name) {
            return Err(syn::Error::new(
                *span,
                format!(
                    "duplicate accessor `{}` in variant set `{}`",
                    name, def.label
                ),
            ));
        }
    }

    Ok(())
}

impl SetDef {
    /// Whether every payload supports mutable access. Sets containing a
    /// shared-reference element type get no `*_mut` field accessors.
    fn all_mutable(&self) -> bool {
        self.elems.iter().all(|elem| elem.mutable)
    }
}

fn type_repr(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

fn tag_ident(def: &SetDef) -> Ident {
    format_ident!("{}Tag", def.ident)
}

/// CamelCases a snake_case identifier for generated support-type names.
fn camel(ident: &Ident) -> String {
    let mut out = String::new();
    for part in ident.to_string().split('_') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn expand(def: &SetDef) -> TokenStream2 {
    let tag_enum = generate_tag_enum(def);
    let handle_enum = generate_handle_enum(def);
    let set_impls = generate_set_impls(def);
    let variant_impls = generate_variant_impls(def);

    let mut methods = vec![generate_builtin_methods(def)];
    let mut support = Vec::new();
    for op in &def.calls {
        methods.push(generate_call(def, op));
    }
    for op in &def.maybe_calls {
        let (method, machinery) = generate_maybe_call(def, op);
        methods.push(method);
        support.push(machinery);
    }
    for field in &def.fields {
        methods.push(generate_field(def, field));
    }
    for field in &def.maybe_fields {
        let (accessors, machinery) = generate_maybe_field(def, field);
        methods.push(accessors);
        support.push(machinery);
    }

    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let ident = &def.ident;
    quote! {
        #tag_enum

        #handle_enum

        #set_impls

        #( #variant_impls )*

        impl #impl_generics #ident #ty_generics #where_clause {
            #( #methods )*
        }

        #( #support )*
    }
}

fn generate_tag_enum(def: &SetDef) -> TokenStream2 {
    let vis = &def.vis;
    let tag_ident = tag_ident(def);
    let count = def.elems.len();
    // Minimal adequate backing width; "enough states, stable order" is the
    // load-bearing part.
    let repr = if count <= 256 {
        quote!(u8)
    } else {
        quote!(u16)
    };
    let tags: Vec<&Ident> = def.elems.iter().map(|e| &e.tag).collect();
    let tag_names: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    let doc = format!(
        "Tag enumeration for [`{}`], one entry per element type in declaration order.",
        def.ident
    );
    quote! {
        #[doc = #doc]
        #[repr(#repr)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #vis enum #tag_ident {
            #( #tags, )*
        }

        impl #tag_ident {
            /// Every tag, in declaration order.
            #vis const ALL: [Self; #count] = [ #( Self::#tags ),* ];

            /// Short name of the element type behind this tag.
            #vis fn name(self) -> &'static str {
                match self {
                    #( Self::#tags => #tag_names, )*
                }
            }
        }
    }
}

fn generate_handle_enum(def: &SetDef) -> TokenStream2 {
    let attrs = &def.attrs;
    let vis = &def.vis;
    let ident = &def.ident;
    let generics = &def.generics;
    let where_clause = &def.generics.where_clause;
    let tags = def.elems.iter().map(|e| &e.tag);
    let tys = def.elems.iter().map(|e| &e.ty);
    quote! {
        #( #attrs )*
        #vis enum #ident #generics #where_clause {
            #( #tags(#tys), )*
        }
    }
}

fn generate_set_impls(def: &SetDef) -> TokenStream2 {
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let ident = &def.ident;
    let tag_ident = tag_ident(def);
    let label = &def.label;
    let count = def.elems.len();
    let tags: Vec<&Ident> = def.elems.iter().map(|e| &e.tag).collect();

    let from_impls = def.elems.iter().map(|elem| {
        let ty = &elem.ty;
        quote! {
            impl #impl_generics ::core::convert::From<#ty> for #ident #ty_generics #where_clause {
                fn from(value: #ty) -> Self {
                    <#ty as ::varset::Variant<Self>>::insert(value)
                }
            }
        }
    });

    quote! {
        impl #impl_generics ::varset::VariantSet for #ident #ty_generics #where_clause {
            const NAME: &'static str = #label;
            const LEN: usize = #count;
            type Tag = #tag_ident;

            fn tag(&self) -> #tag_ident {
                match self {
                    #( Self::#tags(_) => #tag_ident::#tags, )*
                }
            }
        }

        #( #from_impls )*
    }
}

fn generate_variant_impls(def: &SetDef) -> Vec<TokenStream2> {
    let (impl_generics, ty_generics, where_clause) = def.generics.split_for_impl();
    let ident = &def.ident;
    def.elems
        .iter()
        .map(|elem| {
            let ty = &elem.ty;
            let tag = &elem.tag;
            quote! {
                #[allow(unreachable_patterns)]
                impl #impl_generics ::varset::Variant<#ident #ty_generics> for #ty #where_clause {
                    fn insert(self) -> #ident #ty_generics {
                        #ident::#tag(self)
                    }

                    fn extract(
                        set: #ident #ty_generics,
                    ) -> ::core::result::Result<Self, ::varset::BadVariantError> {
                        match set {
                            #ident::#tag(value) => ::core::result::Result::Ok(value),
                            other => ::core::result::Result::Err(::varset::BadVariantError::new(
                                <#ident #ty_generics as ::varset::VariantSet>::NAME,
                                ::varset::VariantSet::tag(&other).name(),
                            )),
                        }
                    }

                    // The borrow lifetime is spelled out: for sets with
                    // lifetime parameters the handle reference carries more
                    // than one lifetime and elision cannot pick.
                    fn peek<'varset>(
                        set: &'varset #ident #ty_generics,
                    ) -> ::core::option::Option<&'varset Self> {
                        match set {
                            #ident::#tag(value) => ::core::option::Option::Some(value),
                            _ => ::core::option::Option::None,
                        }
                    }

                    fn peek_mut<'varset>(
                        set: &'varset mut #ident #ty_generics,
                    ) -> ::core::option::Option<&'varset mut Self> {
                        match set {
                            #ident::#tag(value) => ::core::option::Option::Some(value),
                            _ => ::core::option::Option::None,
                        }
                    }

                    unsafe fn peek_unchecked<'varset>(
                        set: &'varset #ident #ty_generics,
                    ) -> &'varset Self {
                        match set {
                            #ident::#tag(value) => value,
                            _ => unsafe { ::core::hint::unreachable_unchecked() },
                        }
                    }

                    unsafe fn peek_unchecked_mut<'varset>(
                        set: &'varset mut #ident #ty_generics,
                    ) -> &'varset mut Self {
                        match set {
                            #ident::#tag(value) => value,
                            _ => unsafe { ::core::hint::unreachable_unchecked() },
                        }
                    }
                }
            }
        })
        .collect()
}

fn generate_builtin_methods(def: &SetDef) -> TokenStream2 {
    let vis = &def.vis;
    let tag_ident = tag_ident(def);
    quote! {
        /// Wraps a value in the case selected by its own type.
        ///
        /// Only element types of the set satisfy the bound; anything else
        /// is a compile error.
        #vis fn new(value: impl ::core::convert::Into<Self>) -> Self {
            value.into()
        }

        /// Tag of the currently active variant.
        #vis fn tag(&self) -> #tag_ident {
            <Self as ::varset::VariantSet>::tag(self)
        }

        /// Shared reference to the payload if the active variant is `T`.
        #vis fn get<T: ::varset::Variant<Self>>(&self) -> ::core::option::Option<&T> {
            <T as ::varset::Variant<Self>>::peek(self)
        }

        /// Mutable reference to the payload if the active variant is `T`.
        #vis fn get_mut<T: ::varset::Variant<Self>>(&mut self) -> ::core::option::Option<&mut T> {
            <T as ::varset::Variant<Self>>::peek_mut(self)
        }

        /// Destructs the handle into a `T` payload, reporting the active
        /// tag on mismatch.
        #vis fn try_extract<T: ::varset::Variant<Self>>(
            self,
        ) -> ::core::result::Result<T, ::varset::BadVariantError> {
            <T as ::varset::Variant<Self>>::extract(self)
        }

        /// Unchecked shared access to a `T` payload.
        ///
        /// # Safety
        ///
        /// The active variant must be `T`.
        #vis unsafe fn get_unchecked<T: ::varset::Variant<Self>>(&self) -> &T {
            unsafe { <T as ::varset::Variant<Self>>::peek_unchecked(self) }
        }

        /// Unchecked mutable access to a `T` payload.
        ///
        /// # Safety
        ///
        /// The active variant must be `T`.
        #vis unsafe fn get_unchecked_mut<T: ::varset::Variant<Self>>(&mut self) -> &mut T {
            unsafe { <T as ::varset::Variant<Self>>::peek_unchecked_mut(self) }
        }
    }
}

/// Receiver expression for one dispatch arm: reference element types
/// dispatch on the pointee, everything else on the bound payload directly.
fn receiver_expr(elem: &ElemType, recv: RecvKind) -> TokenStream2 {
    if elem.by_ref {
        match recv {
            RecvKind::Shared => quote!(&**value),
            RecvKind::Mut => quote!(&mut **value),
            RecvKind::Owned => quote!(*value),
        }
    } else {
        quote!(value)
    }
}

fn generate_call(def: &SetDef, op: &OpDecl) -> TokenStream2 {
    let vis = &def.vis;
    let name = &op.name;
    let arg_names: Vec<&Ident> = op.params.iter().map(|(name, _)| name).collect();
    let arg_tys: Vec<&Type> = op.params.iter().map(|(_, ty)| ty).collect();
    let ret = match &op.ret {
        Some(ty) => quote!(-> #ty),
        None => TokenStream2::new(),
    };
    let recv = match op.recv {
        RecvKind::Shared => quote!(&self),
        RecvKind::Mut => quote!(&mut self),
        RecvKind::Owned => quote!(self),
    };

    let arms: Vec<TokenStream2> = def
        .elems
        .iter()
        .map(|elem| {
            let tag = &elem.tag;
            let target = &elem.target;
            let receiver = receiver_expr(elem, op.recv);
            // Spanned to the declaration so a missing or mismatched
            // operation is reported at the `fn` line inside the macro
            // invocation.
            quote_spanned! { name.span() =>
                Self::#tag(value) => <#target>::#name(#receiver #(, #arg_names)*),
            }
        })
        .collect();

    let doc = format!("Dispatches `{name}` on the active variant.");
    quote! {
        #[doc = #doc]
        #vis fn #name(#recv #(, #arg_names: #arg_tys)*) #ret {
            match self {
                #( #arms )*
            }
        }
    }
}

fn generate_field(def: &SetDef, field: &FieldDecl) -> TokenStream2 {
    let vis = &def.vis;
    let name = &field.name;
    let ty = &field.ty;
    let ref_name = format_ident!("{}_ref", name);
    let mut_name = format_ident!("{}_mut", name);

    let tags = def.elems.iter().map(|e| &e.tag);
    let val_arms: Vec<TokenStream2> = tags
        .clone()
        .map(|tag| {
            quote_spanned! { name.span() =>
                Self::#tag(value) => ::core::clone::Clone::clone(&value.#name),
            }
        })
        .collect();
    let ref_arms: Vec<TokenStream2> = tags
        .clone()
        .map(|tag| {
            quote_spanned! { name.span() =>
                Self::#tag(value) => &value.#name,
            }
        })
        .collect();
    let mut_arms: Vec<TokenStream2> = tags
        .map(|tag| {
            quote_spanned! { name.span() =>
                Self::#tag(value) => &mut value.#name,
            }
        })
        .collect();

    let mut_doc = format!("Mutable reference to the `{name}` field of the active variant.");
    let mut_accessor = if def.all_mutable() {
        quote! {
            #[doc = #mut_doc]
            #vis fn #mut_name(&mut self) -> &mut #ty {
                match self {
                    #( #mut_arms )*
                }
            }
        }
    } else {
        TokenStream2::new()
    };

    let val_doc = format!("Copy of the `{name}` field of the active variant.");
    let ref_doc = format!("Shared reference to the `{name}` field of the active variant.");
    quote! {
        #[doc = #val_doc]
        #vis fn #name(&self) -> #ty {
            match self {
                #( #val_arms )*
            }
        }

        #[doc = #ref_doc]
        #vis fn #ref_name(&self) -> &#ty {
            match self {
                #( #ref_arms )*
            }
        }

        #mut_accessor
    }
}

fn generate_maybe_call(def: &SetDef, op: &OpDecl) -> (TokenStream2, TokenStream2) {
    let vis = &def.vis;
    let name = &op.name;
    // Guaranteed by validate().
    let cap = op.via.as_ref().expect("conditional operation without `via`");
    let arg_names: Vec<&Ident> = op.params.iter().map(|(name, _)| name).collect();
    let arg_tys: Vec<&Type> = op.params.iter().map(|(_, ty)| ty).collect();
    let ret: Type = op.ret.clone().unwrap_or_else(|| syn::parse_quote!(()));

    let arm_struct = format_ident!("__{}{}Arm", def.ident, camel(name));
    let present = format_ident!("__{}{}Present", def.ident, camel(name));
    let absent = format_ident!("__{}{}Absent", def.ident, camel(name));

    let (held, recv) = match op.recv {
        RecvKind::Shared => (quote!(&'varset T), quote!(&self)),
        // Owned receivers are rejected by validate().
        _ => (quote!(&'varset mut T), quote!(&mut self)),
    };

    let arms: Vec<TokenStream2> = def
        .elems
        .iter()
        .map(|elem| {
            let tag = &elem.tag;
            // A `&mut self` operation can never run through a
            // shared-reference payload, capability or not; that arm is
            // plain absence.
            if op.recv == RecvKind::Mut && !elem.mutable {
                return quote_spanned! { name.span() =>
                    Self::#tag(value) => {
                        let _ = value;
                        ::core::option::Option::None
                    }
                };
            }
            let payload = receiver_expr(elem, op.recv);
            quote_spanned! { name.span() =>
                Self::#tag(value) => (&mut #arm_struct(::core::option::Option::Some(#payload)))
                    .__invoke(#( #arg_names ),*),
            }
        })
        .collect();

    let doc = format!(
        "Dispatches `{}` on the active variant if its type implements `{}`; \
         returns `None` otherwise.",
        name,
        cap.to_token_stream()
    );
    let method = quote! {
        #[doc = #doc]
        #vis fn #name(#recv #(, #arg_names: #arg_tys)*) -> ::core::option::Option<#ret> {
            match self {
                #( #arms )*
            }
        }
    };

    // Presence resolves per concrete arm: the capability-bound impl matches
    // the receiver exactly, the fallback needs one autoref and loses
    // whenever the bound holds.
    let machinery = quote! {
        #[doc(hidden)]
        #[allow(dead_code)]
        struct #arm_struct<'varset, T: ?Sized>(::core::option::Option<#held>);

        #[doc(hidden)]
        #[allow(dead_code)]
        trait #present {
            fn __invoke(&mut self #(, #arg_names: #arg_tys)*) -> ::core::option::Option<#ret>;
        }

        impl<'varset, T: #cap + ?Sized> #present for #arm_struct<'varset, T> {
            fn __invoke(&mut self #(, #arg_names: #arg_tys)*) -> ::core::option::Option<#ret> {
                let receiver = self.0.take()?;
                ::core::option::Option::Some(<T as #cap>::#name(receiver #(, #arg_names)*))
            }
        }

        #[doc(hidden)]
        #[allow(dead_code)]
        trait #absent {
            fn __invoke(&mut self #(, #arg_names: #arg_tys)*) -> ::core::option::Option<#ret>;
        }

        #[allow(unused_variables)]
        impl<'varset, T: ?Sized> #absent for &mut #arm_struct<'varset, T> {
            fn __invoke(&mut self #(, #arg_names: #arg_tys)*) -> ::core::option::Option<#ret> {
                ::core::option::Option::None
            }
        }
    };

    (method, machinery)
}

fn generate_maybe_field(def: &SetDef, field: &FieldDecl) -> (TokenStream2, TokenStream2) {
    let vis = &def.vis;
    let name = &field.name;
    let ty = &field.ty;
    // Guaranteed by validate().
    let cap = field.via.as_ref().expect("conditional field without `via`");
    let ref_name = format_ident!("{}_ref", name);
    let mut_name = format_ident!("{}_mut", name);

    let ref_arm = format_ident!("__{}{}RefArm", def.ident, camel(name));
    let ref_present = format_ident!("__{}{}RefPresent", def.ident, camel(name));
    let ref_absent = format_ident!("__{}{}RefAbsent", def.ident, camel(name));
    let mut_arm = format_ident!("__{}{}MutArm", def.ident, camel(name));
    let mut_present = format_ident!("__{}{}MutPresent", def.ident, camel(name));
    let mut_absent = format_ident!("__{}{}MutAbsent", def.ident, camel(name));

    let shared_arms = |invoke: TokenStream2| -> Vec<TokenStream2> {
        def.elems
            .iter()
            .map(|elem| {
                let tag = &elem.tag;
                let payload = receiver_expr(elem, RecvKind::Shared);
                quote_spanned! { name.span() =>
                    Self::#tag(value) => (&mut #ref_arm(::core::option::Option::Some(#payload)))
                        .#invoke(),
                }
            })
            .collect()
    };
    let val_arms = shared_arms(quote!(__val));
    let ref_arms = shared_arms(quote!(__ref));
    let mut_arms: Vec<TokenStream2> = def
        .elems
        .iter()
        .map(|elem| {
            let tag = &elem.tag;
            let payload = receiver_expr(elem, RecvKind::Mut);
            quote_spanned! { name.span() =>
                Self::#tag(value) => (&mut #mut_arm(::core::option::Option::Some(#payload)))
                    .__mut(),
            }
        })
        .collect();

    let cap_name = cap.to_token_stream().to_string();
    let val_doc = format!(
        "Copy of the `{name}` field if the active variant's type implements `{cap_name}`."
    );
    let ref_doc = format!(
        "Shared reference to the `{name}` field if the active variant's type implements `{cap_name}`."
    );
    let mut_doc = format!(
        "Mutable reference to the `{name}` field if the active variant's type implements `{cap_name}`."
    );
    let mut_accessor = if def.all_mutable() {
        quote! {
            #[doc = #mut_doc]
            #vis fn #mut_name(&mut self) -> ::core::option::Option<&mut #ty> {
                match self {
                    #( #mut_arms )*
                }
            }
        }
    } else {
        TokenStream2::new()
    };
    let accessors = quote! {
        #[doc = #val_doc]
        #vis fn #name(&self) -> ::core::option::Option<#ty> {
            match self {
                #( #val_arms )*
            }
        }

        #[doc = #ref_doc]
        #vis fn #ref_name(&self) -> ::core::option::Option<&#ty> {
            match self {
                #( #ref_arms )*
            }
        }

        #mut_accessor
    };

    let mut_machinery = if def.all_mutable() {
        quote! {
            #[doc(hidden)]
            #[allow(dead_code)]
            struct #mut_arm<'varset, T: ?Sized>(::core::option::Option<&'varset mut T>);

            #[doc(hidden)]
            trait #mut_present<'varset> {
                fn __mut(&mut self) -> ::core::option::Option<&'varset mut #ty>;
            }

            impl<'varset, T: #cap + ?Sized> #mut_present<'varset> for #mut_arm<'varset, T> {
                fn __mut(&mut self) -> ::core::option::Option<&'varset mut #ty> {
                    let receiver = self.0.take()?;
                    ::core::option::Option::Some(<T as #cap>::get_mut(receiver))
                }
            }

            #[doc(hidden)]
            trait #mut_absent<'varset> {
                fn __mut(&mut self) -> ::core::option::Option<&'varset mut #ty>;
            }

            impl<'varset, T: ?Sized> #mut_absent<'varset> for &mut #mut_arm<'varset, T> {
                fn __mut(&mut self) -> ::core::option::Option<&'varset mut #ty> {
                    ::core::option::Option::None
                }
            }
        }
    } else {
        TokenStream2::new()
    };

    let machinery = quote! {
        #[doc(hidden)]
        #[allow(dead_code)]
        struct #ref_arm<'varset, T: ?Sized>(::core::option::Option<&'varset T>);

        #[doc(hidden)]
        trait #ref_present<'varset> {
            fn __val(&mut self) -> ::core::option::Option<#ty>;
            fn __ref(&mut self) -> ::core::option::Option<&'varset #ty>;
        }

        impl<'varset, T: #cap + ?Sized> #ref_present<'varset> for #ref_arm<'varset, T> {
            fn __val(&mut self) -> ::core::option::Option<#ty> {
                let receiver = self.0.take()?;
                ::core::option::Option::Some(::core::clone::Clone::clone(<T as #cap>::get(receiver)))
            }

            fn __ref(&mut self) -> ::core::option::Option<&'varset #ty> {
                let receiver = self.0.take()?;
                ::core::option::Option::Some(<T as #cap>::get(receiver))
            }
        }

        #[doc(hidden)]
        trait #ref_absent<'varset> {
            fn __val(&mut self) -> ::core::option::Option<#ty>;
            fn __ref(&mut self) -> ::core::option::Option<&'varset #ty>;
        }

        impl<'varset, T: ?Sized> #ref_absent<'varset> for &mut #ref_arm<'varset, T> {
            fn __val(&mut self) -> ::core::option::Option<#ty> {
                ::core::option::Option::None
            }

            fn __ref(&mut self) -> ::core::option::Option<&'varset #ty> {
                ::core::option::Option::None
            }
        }

        #mut_machinery
    };

    (accessors, machinery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> syn::Result<SetDef> {
        syn::parse_str::<SetDef>(input)
    }

    #[test]
    fn parses_minimal_set() {
        let def = parse("pub enum Creature { variants: [Orc, Troll] }").unwrap();
        assert_eq!(def.label, "Creature");
        assert_eq!(def.elems.len(), 2);
        assert_eq!(def.elems[0].tag.to_string(), "Orc");
        assert_eq!(def.elems[1].tag.to_string(), "Troll");
    }

    #[test]
    fn label_override() {
        let def = parse(r#"enum C as "creatures" { variants: [Orc] }"#).unwrap();
        assert_eq!(def.label, "creatures");
    }

    #[test]
    fn short_name_strips_path_and_reference() {
        let def = parse("enum C<'a> { variants: [wild::Goblin, &'a Orc] }").unwrap();
        assert_eq!(def.elems[0].tag.to_string(), "Goblin");
        assert!(!def.elems[0].by_ref);
        assert_eq!(def.elems[1].tag.to_string(), "Orc");
        assert!(def.elems[1].by_ref);
        assert!(!def.elems[1].mutable);
        assert!(!def.all_mutable());
    }

    #[test]
    fn mutable_reference_elements_keep_mut_access() {
        let def = parse("enum C<'a> { variants: [&'a mut Orc, Troll] }").unwrap();
        assert!(def.elems[0].by_ref);
        assert!(def.elems[0].mutable);
        assert!(def.all_mutable());
    }

    #[test]
    fn parses_full_grammar() {
        let def = parse(
            r#"
            pub enum Creature as "creatures" {
                variants: [Orc, Troll],
                calls: {
                    fn heal(&mut self, amount: u32);
                    fn health(&self) -> u32;
                },
                maybe_calls: {
                    fn cast(&mut self, cost: u32) -> u32 via Caster;
                },
                fields: { hp: u32 },
                maybe_fields: { mana: u32 via ManaPool },
            }
            "#,
        )
        .unwrap();
        assert_eq!(def.calls.len(), 2);
        assert_eq!(def.maybe_calls.len(), 1);
        assert_eq!(def.fields.len(), 1);
        assert_eq!(def.maybe_fields.len(), 1);
        assert!(def.maybe_calls[0].via.is_some());
        assert!(def.calls[0].recv == RecvKind::Mut);
        assert!(def.calls[1].recv == RecvKind::Shared);
    }

    #[test]
    fn rejects_duplicate_element_type() {
        let err = parse("enum C { variants: [Orc, Orc] }").unwrap_err();
        assert!(err.to_string().contains("duplicate element type `Orc`"));
    }

    #[test]
    fn rejects_short_name_collision() {
        let err = parse("enum C { variants: [wild::Orc, tame::Orc] }").unwrap_err();
        assert!(err.to_string().contains("share tag name `Orc`"));
    }

    #[test]
    fn rejects_empty_variant_list() {
        let err = parse("enum C { variants: [] }").unwrap_err();
        assert!(err.to_string().contains("at least one element type"));
    }

    #[test]
    fn rejects_missing_variants_section() {
        let err = parse("enum C { calls: { fn f(&self); } }").unwrap_err();
        assert!(err.to_string().contains("no `variants` section"));
    }

    #[test]
    fn rejects_unnameable_element_type() {
        let err = parse("enum C { variants: [(Orc, Troll)] }").unwrap_err();
        assert!(err.to_string().contains("cannot derive a tag name"));
    }

    #[test]
    fn rejects_missing_via_on_conditional_op() {
        let err = parse("enum C { variants: [Orc], maybe_calls: { fn cast(&mut self) -> u32; } }")
            .unwrap_err();
        assert!(err.to_string().contains("needs a `via` capability trait"));
    }

    #[test]
    fn rejects_via_on_uniform_op() {
        let err = parse("enum C { variants: [Orc], calls: { fn heal(&mut self) via Healer; } }")
            .unwrap_err();
        assert!(err.to_string().contains("only applies to `maybe_calls`"));
    }

    #[test]
    fn rejects_owned_receiver_on_conditional_op() {
        let err =
            parse("enum C { variants: [Orc], maybe_calls: { fn consume(self) via Eater; } }")
                .unwrap_err();
        assert!(err.to_string().contains("use `&self` or `&mut self`"));
    }

    #[test]
    fn rejects_missing_via_on_conditional_field() {
        let err = parse("enum C { variants: [Orc], maybe_fields: { mana: u32 } }").unwrap_err();
        assert!(err.to_string().contains("needs a `via` capability trait"));
    }

    #[test]
    fn rejects_reserved_accessor_name() {
        let err = parse("enum C { variants: [Orc], calls: { fn tag(&self) -> u32; } }")
            .unwrap_err();
        assert!(err.to_string().contains("built-in handle method"));
    }

    #[test]
    fn rejects_accessor_name_clash_between_op_and_field() {
        let err = parse("enum C { variants: [Orc], calls: { fn hp(&self) -> u32; }, fields: { hp: u32 } }")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate accessor `hp`"));
    }

    #[test]
    fn camel_cases_operation_names() {
        let ident = format_ident!("cast_fire_bolt");
        assert_eq!(camel(&ident), "CastFireBolt");
    }

    #[test]
    fn expansion_mentions_every_tag() {
        let def = parse("pub enum Creature { variants: [Orc, Troll] }").unwrap();
        let expanded = expand(&def).to_string();
        assert!(expanded.contains("enum CreatureTag"));
        assert!(expanded.contains("Orc"));
        assert!(expanded.contains("Troll"));
        assert!(expanded.contains("VariantSet"));
    }
}
