use std::borrow::Cow;

use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const POST: &str = "Post";
	pub const PROFILE: &str = "Profile";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Chirp")
		.summary("A small social feed")
		.description(
			"The query surface behind the Chirp pages. Operation ids match the \
			 names of the cached queries the pages read through.",
		)
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Sign up, sign in and the signed-in user".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("Reading and creating posts".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::PROFILE.into(),
			description: Some("Public user profiles".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::Message<'static>>, _>(|res| {
			res.example(error::Message {
				content: "error message".into(),
				field: Some("optional field".into()),
				details: Some(Cow::Owned({
					let mut map = error::Map::new();
					map.insert("key".into(), serde_json::json!("value"));
					map
				})),
			})
		})
}
