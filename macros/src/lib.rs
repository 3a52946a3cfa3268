use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, FieldsNamed, LitStr, Type};

/// Derive macro for implementing `IntoPageArgument`
///
/// Every field becomes one request argument named after the field, its
/// value formatted with `Display`. `Option` fields are only added when
/// `Some`; `Vec` fields add one argument per element.
///
/// # Examples
///
/// ```ignore
/// use page_builder::{IntoPageArgument, PageArguments};
///
/// #[derive(PageArguments)]
/// struct WifiForm {
///     ssid: String,
///     #[page_argument(rename = "pass")]
///     password: String,
///     channel: Option<u8>,
///     #[page_argument(skip)]
///     retries: u32,
/// }
/// ```
#[proc_macro_derive(PageArguments, attributes(page_argument))]
pub fn derive_page_arguments(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate_page_arguments_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn generate_page_arguments_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let data = match &input.data {
        Data::Struct(data) => data,
        _ => return Err(syn::Error::new_spanned(input, "PageArguments can only be derived for structs")),
    };

    let fields = match &data.fields {
        Fields::Named(fields) => fields,
        Fields::Unnamed(_) => return Err(syn::Error::new_spanned(input, "PageArguments requires named fields")),
        Fields::Unit => return Err(syn::Error::new_spanned(input, "PageArguments cannot be derived for unit structs")),
    };

    let pushes = generate_field_pushes(fields)?;

    Ok(quote! {
        impl #impl_generics page_builder::IntoPageArgument for #name #ty_generics #where_clause {
            fn to_page_argument(&self) -> page_builder::PageArgument {
                let mut args = page_builder::PageArgument::new();
                #pushes
                args
            }
        }
    })
}

fn generate_field_pushes(fields: &FieldsNamed) -> syn::Result<TokenStream2> {
    let mut pushes = Vec::new();

    for field in &fields.named {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attributes(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let argument_name = attrs.rename.unwrap_or_else(|| field_name.to_string());

        let push = if is_option_type(&field.ty) {
            quote! {
                if let Some(ref value) = self.#field_name {
                    args.push(#argument_name, value.to_string());
                }
            }
        } else if is_vec_type(&field.ty) {
            quote! {
                for value in &self.#field_name {
                    args.push(#argument_name, value.to_string());
                }
            }
        } else {
            quote! {
                args.push(#argument_name, self.#field_name.to_string());
            }
        };
        pushes.push(push);
    }

    Ok(quote! {
        #(#pushes)*
    })
}

#[derive(Default)]
struct FieldAttributes {
    skip: bool,
    rename: Option<String>,
}

fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut result = FieldAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("page_argument") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                result.rename = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("Invalid page_argument attribute"))
            }
        })?;
    }

    Ok(result)
}

fn last_segment_is(ty: &Type, ident: &str) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == ident;
        }
    }
    false
}

fn is_option_type(ty: &Type) -> bool {
    last_segment_is(ty, "Option")
}

fn is_vec_type(ty: &Type) -> bool {
    last_segment_is(ty, "Vec")
}
