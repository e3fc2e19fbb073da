//! Derive macros for the Probabilistic Model Checking Toolkit.
use proc_macro::TokenStream as MacroTokenStream;
use proc_macro2::{Span, TokenStream};
use proc_macro_crate::FoundCrate;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Ident, Member, Type};

macro_rules! bail {
    ($span:expr, $($tokens:tt)*) => {
        {
            return Err(::syn::Error::new_spanned(
                $span,
                format!($($tokens)*)
            ));
        }
    };
}

fn resolve_crate(name: &str) -> TokenStream {
    let lib_name = name.replace('-', "_");
    match proc_macro_crate::crate_name(name) {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new_raw(&name, Span::call_site());
            quote!(:: #ident)
        }
        // Integration tests of the crate itself see `Itself` but have to use the extern name
        Ok(FoundCrate::Itself)
            if std::env::var("CARGO_CRATE_NAME").is_ok_and(|current| current == lib_name) =>
        {
            quote!(crate)
        }
        _ => {
            let ident = Ident::new_raw(&lib_name, Span::call_site());
            quote!(:: #ident)
        }
    }
}

struct ReprTransparent<'a> {
    field: Member,
    field_ty: &'a Type,
}

fn require_repr_transparent<'a>(
    target: &impl ToTokens,
    name: &str,
    attrs: &[Attribute],
    data: &'a Data,
) -> syn::Result<ReprTransparent<'a>> {
    let mut repr_transparent_found = false;

    for attr in attrs {
        if attr.meta.path().is_ident("repr") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("transparent") {
                    repr_transparent_found = true;
                } else {
                    bail!(
                        &attr,
                        "deriving `{name}` is only supported for `#[repr(transparent)]` structs"
                    );
                }
                Ok(())
            })?;
        }
    }

    if !repr_transparent_found {
        bail!(target, "`derive({name})` requires `#[repr(transparent)]`");
    }

    let data_struct = match data {
        Data::Struct(data_struct) => data_struct,
        Data::Enum(data_enum) => {
            bail!(
                data_enum.enum_token,
                "can only derive `{name}` for `struct` types"
            );
        }
        Data::Union(data_union) => {
            bail!(
                data_union.union_token,
                "can only derive `{name}` for `struct` types"
            );
        }
    };

    let mut fields = data_struct.fields.iter();
    let (Some(field_def), None) = (fields.next(), fields.next()) else {
        bail!(target, "`derive({name})` requires exactly one field");
    };

    let field: Member = match &field_def.ident {
        Some(ident) => ident.clone().into(),
        None => 0.into(),
    };

    Ok(ReprTransparent {
        field,
        field_ty: &field_def.ty,
    })
}

mod id;

/// Derives `pmctk_ids::Id` and its supertraits for a `#[repr(transparent)]` newtype around an
/// existing id type.
#[proc_macro_derive(Id)]
pub fn derive_id(input: MacroTokenStream) -> MacroTokenStream {
    id::derive_id(parse_macro_input!(input as DeriveInput))
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
