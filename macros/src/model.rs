use darling::{ast, FromMeta};
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::Meta;

#[derive(Debug, Default, FromMeta)]
struct ModelArgs {
	#[darling(default)]
	create: bool,
}

/// Whether the attribute list contains `#[<path>(... <ident> ...)]`.
fn has_flag(attrs: &[syn::Attribute], path: &str, flags: &[&str]) -> bool {
	attrs.iter().any(|attr| {
		let Meta::List(ref list) = attr.meta else {
			return false;
		};

		if !list.path.is_ident(path) {
			return false;
		}

		list.tokens.to_token_stream().into_iter().any(|token| {
			matches!(token, TokenTree::Ident(ref ident) if flags.iter().any(|flag| ident == flag))
		})
	})
}

/// Fields left out of the generated inputs: `#[model(skip)]`, `#[serde(skip)]`
/// and `#[serde(skip_deserializing)]`.
fn is_skipped(attrs: &[syn::Attribute]) -> bool {
	has_flag(attrs, "model", &["skip"]) || has_flag(attrs, "serde", &["skip_deserializing", "skip"])
}

pub fn from_input(
	args: proc_macro::TokenStream,
	input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
	let args = match ast::NestedMeta::parse_meta_list(args.into()) {
		Ok(x) => x,
		Err(e) => return e.into_compile_error().into(),
	};

	let args = match ModelArgs::from_list(&args) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let mut input = syn::parse_macro_input!(input as syn::DeriveInput);

	if !args.create {
		return syn::Error::new_spanned(&input.ident, "#[model] expects `create`")
			.into_compile_error()
			.into();
	}

	let syn::Data::Struct(syn::DataStruct {
		fields: syn::Fields::Named(ref mut named),
		..
	}) = input.data
	else {
		return syn::Error::new_spanned(&input.ident, "#[model] expects a struct with named fields")
			.into_compile_error()
			.into();
	};

	let mut fields = Vec::new();

	for field in &mut named.named {
		let skipped = is_skipped(&field.attrs);

		// `#[model(..)]` is not a real attribute, so it cannot stay on the model
		field.attrs.retain(|attr| !attr.path().is_ident("model"));

		if !skipped {
			fields.push(field.clone());
		}
	}

	let ident = &input.ident;
	let vis = &input.vis;
	let generics = &input.generics;
	let attrs = &input.attrs;

	let create_ident = format_ident!("Create{}Input", ident);

	quote! {
		#input

		#(#attrs)*
		#vis struct #create_ident #generics {
			#(
				#fields,
			)*
		}
	}
	.into()
}
