mod model;
mod route;

use proc_macro::TokenStream;

/// Creates a new documentation function for the route, named after the original function with the suffix `_docs`.
///
/// The first line of the doc comment becomes the summary and the rest the description.
/// `id = "..."` sets the operation id, which for query routes matches the query name.
#[proc_macro_attribute]
pub fn route(args: TokenStream, input: TokenStream) -> TokenStream {
	route::from_input(args, input)
}

/// Creates the input struct of the model, `CreateXInput`, with `#[model(create)]`.
///
/// Fields marked #[model(skip)], #[serde(skip_deserializing)] or #[serde(skip)] are left out, and all
/// other fields are copied verbatim (including attributes).
#[proc_macro_attribute]
pub fn model(args: TokenStream, input: TokenStream) -> TokenStream {
	model::from_input(args, input)
}
