use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, GenericArgument, PathArguments, Type, parse_macro_input};

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_injectable_impl(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(e) => TokenStream::from(e.to_compile_error()),
    }
}

enum FieldKind<'a> {
    Required(&'a Type),
    Optional(&'a Type),
    Default,
}

fn generate_injectable_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => {
                return Ok(quote! {
                    impl #impl_generics ::hostkit::di::Injectable for #struct_name #ty_generics #where_clause {
                        fn inject(
                            _resolver: &::hostkit::di::Resolver<'_>
                        ) -> ::hostkit::Result<Self> {
                            Ok(Self)
                        }
                    }
                });
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "#[derive(Injectable)] only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Injectable)] can only be applied to structs",
            ));
        }
    };

    let mut field_injections = Vec::new();
    let mut dependencies = Vec::new();

    for field in fields {
        let field_name = &field.ident;
        match classify(&field.ty) {
            FieldKind::Required(inner) => {
                field_injections.push(quote! {
                    #field_name: resolver.resolve::<#inner>()?
                });
                dependencies.push(quote! {
                    ::hostkit::di::Capability::of::<#inner>()
                });
            }
            FieldKind::Optional(inner) => {
                field_injections.push(quote! {
                    #field_name: if resolver.provider().contains::<#inner>() {
                        Some(resolver.resolve::<#inner>()?)
                    } else {
                        None
                    }
                });
            }
            FieldKind::Default => {
                field_injections.push(quote! {
                    #field_name: ::core::default::Default::default()
                });
            }
        }
    }

    Ok(quote! {
        impl #impl_generics ::hostkit::di::Injectable for #struct_name #ty_generics #where_clause {
            fn inject(
                resolver: &::hostkit::di::Resolver<'_>
            ) -> ::hostkit::Result<Self> {
                Ok(Self {
                    #(#field_injections),*
                })
            }

            fn dependencies() -> ::std::vec::Vec<::hostkit::di::Capability> {
                ::std::vec![#(#dependencies),*]
            }
        }
    })
}

fn classify(ty: &Type) -> FieldKind<'_> {
    if let Some(inner) = single_generic(ty, "Arc") {
        return FieldKind::Required(inner);
    }
    if let Some(inner) = single_generic(ty, "Option").and_then(|option| single_generic(option, "Arc")) {
        return FieldKind::Optional(inner);
    }
    FieldKind::Default
}

/// Extract `T` from `Wrapper<T>` when the last path segment is `wrapper`
fn single_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}
