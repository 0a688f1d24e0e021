//! Server-rendered HTML.
//!
//! Markup is built with `format!`. Every piece of user-provided text goes
//! through [`escape`] before it is written into a document.

mod composer;
mod feed;

use std::fmt::Write;

use axum::{
	http::StatusCode,
	response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Utc};

pub use composer::{Composer, ComposerError};
pub use feed::{post_view, FeedView};

use crate::query::Snapshot;

/// The id of the `<script>` element that carries the query snapshot.
pub const SNAPSHOT_ELEMENT_ID: &str = "__query_state";

const DEFAULT_TITLE: &str = "Chirp";

const STYLE: &str = "\
body{margin:0;background:#000;color:#e2e8f0;font-family:system-ui,sans-serif}\
main{display:flex;justify-content:center;min-height:100vh}\
.column{width:100%;max-width:42rem;border-left:1px solid #94a3b8;border-right:1px solid #94a3b8}\
.bar{display:flex;gap:.75rem;padding:1rem;border-bottom:1px solid #94a3b8}\
.post{display:flex;gap:.75rem;padding:1rem;border-bottom:1px solid #94a3b8}\
.post-meta{display:flex;gap:.5rem;color:#cbd5e1}\
.post-content{font-size:1.5rem}\
.avatar{width:3.5rem;height:3.5rem;border-radius:9999px}\
.banner{position:relative;height:9rem;background:#475569}\
.banner img{position:absolute;bottom:-4rem;left:1rem;border-radius:9999px;border:4px solid #000;background:#000}\
.handle{padding:5rem 1rem 1rem;font-size:1.5rem;font-weight:bold;border-bottom:1px solid #94a3b8}\
.placeholder{display:flex;justify-content:center;padding:2rem}\
.error{color:#f87171}\
a{color:inherit;text-decoration:none}\
input{flex-grow:1;background:transparent;color:inherit;border:none;outline:none}";

/// Escapes text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());

	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			c => escaped.push(c),
		}
	}

	escaped
}

/// A rendered page, ready to be sent.
#[derive(Debug)]
pub struct Page {
	pub status: StatusCode,
	/// The document title. Falls back to the site name.
	pub title: Option<String>,
	pub body: String,
	/// Queries read while rendering, embedded so a client can seed its cache.
	pub snapshot: Option<Snapshot>,
}

impl Page {
	pub fn new(body: String) -> Self {
		Self {
			status: StatusCode::OK,
			title: None,
			body,
			snapshot: None,
		}
	}

	#[must_use]
	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());
		self
	}

	#[must_use]
	pub fn status(mut self, status: StatusCode) -> Self {
		self.status = status;
		self
	}

	#[must_use]
	pub fn snapshot(mut self, snapshot: Snapshot) -> Self {
		self.snapshot = Some(snapshot);
		self
	}

	/// The 404 placeholder. The title is never taken from the missing record.
	pub fn not_found() -> Self {
		Self::new(layout(&placeholder("404"))).status(StatusCode::NOT_FOUND)
	}

	/// Rendered when the page could not be built at all.
	pub fn failed(status: StatusCode) -> Self {
		Self::new(layout(&failed())).status(status)
	}

	pub fn render(&self) -> String {
		document(
			self.title.as_deref().unwrap_or(DEFAULT_TITLE),
			&self.body,
			self.snapshot.as_ref(),
		)
	}
}

impl IntoResponse for Page {
	fn into_response(self) -> Response {
		(self.status, Html(self.render())).into_response()
	}
}

/// A complete HTML document around an already rendered body.
pub fn document(title: &str, body: &str, snapshot: Option<&Snapshot>) -> String {
	let mut html = format!(
		"<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
		 <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
		 <title>{}</title><style>{STYLE}</style></head><body>{body}",
		escape(title),
	);

	if let Some(snapshot) = snapshot.filter(|snapshot| !snapshot.is_empty()) {
		let _ = write!(
			html,
			"<script id=\"{SNAPSHOT_ELEMENT_ID}\" type=\"application/json\">{}</script>",
			snapshot.to_script_json()
		);
	}

	html.push_str("</body></html>");
	html
}

/// The centered single column every page lives in.
pub fn layout(content: &str) -> String {
	format!("<main><div class=\"column\">{content}</div></main>")
}

pub fn placeholder(text: &str) -> String {
	format!("<div class=\"placeholder\">{}</div>", escape(text))
}

pub fn loading() -> String {
	"<div class=\"placeholder\" role=\"status\" aria-label=\"Loading\">Loading...</div>".into()
}

pub fn failed() -> String {
	"<div class=\"placeholder error\" role=\"alert\">Something went wrong</div>".into()
}

/// How long ago something happened, in the style of day.js `fromNow`.
///
/// Times in the future count as just now.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
	let round = |value: f64| value.round() as i64;

	let seconds = (now - then).num_milliseconds().max(0) as f64 / 1000.0;
	let minutes = seconds / 60.0;
	let hours = minutes / 60.0;
	let days = hours / 24.0;
	let months = days / 30.436_875;
	let years = months / 12.0;

	let relative = if round(seconds) <= 44 {
		"a few seconds".into()
	} else if round(seconds) <= 89 {
		"a minute".into()
	} else if round(minutes) <= 44 {
		format!("{} minutes", round(minutes))
	} else if round(minutes) <= 89 {
		"an hour".into()
	} else if round(hours) <= 21 {
		format!("{} hours", round(hours))
	} else if round(hours) <= 35 {
		"a day".into()
	} else if round(days) <= 25 {
		format!("{} days", round(days))
	} else if round(days) <= 45 {
		"a month".into()
	} else if round(months) <= 10 {
		format!("{} months", round(months))
	} else if round(months) <= 17 {
		"a year".into()
	} else {
		format!("{} years", round(years).max(2))
	};

	format!("{relative} ago")
}

#[cfg(test)]
mod test {
	use chrono::{Duration, Utc};

	use super::{document, escape, time_ago, Page};
	use crate::query::{DehydratedQuery, Snapshot};

	#[test]
	fn test_escape() {
		assert_eq!(
			escape(r#"<b class="x">Tom & Jerry's</b>"#),
			"&lt;b class=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/b&gt;"
		);
	}

	#[test]
	fn test_time_ago_thresholds() {
		let now = Utc::now();
		let ago = |duration: Duration| time_ago(now - duration, now);

		assert_eq!(ago(Duration::seconds(3)), "a few seconds ago");
		assert_eq!(ago(Duration::seconds(60)), "a minute ago");
		assert_eq!(ago(Duration::minutes(3)), "3 minutes ago");
		assert_eq!(ago(Duration::minutes(60)), "an hour ago");
		assert_eq!(ago(Duration::hours(5)), "5 hours ago");
		assert_eq!(ago(Duration::hours(30)), "a day ago");
		assert_eq!(ago(Duration::days(10)), "10 days ago");
		assert_eq!(ago(Duration::days(30)), "a month ago");
		assert_eq!(ago(Duration::days(120)), "4 months ago");
		assert_eq!(ago(Duration::days(400)), "a year ago");
		assert_eq!(ago(Duration::days(1000)), "3 years ago");
	}

	#[test]
	fn test_time_ago_in_the_future() {
		let now = Utc::now();

		assert_eq!(time_ago(now + Duration::seconds(30), now), "a few seconds ago");
	}

	#[test]
	fn test_document_escapes_title() {
		let html = document("<script>", "", None);

		assert!(html.contains("<title>&lt;script&gt;</title>"));
	}

	#[test]
	fn test_empty_snapshot_is_not_embedded() {
		let html = document("t", "", Some(&Snapshot::default()));

		assert!(!html.contains(super::SNAPSHOT_ELEMENT_ID));

		let snapshot = Snapshot {
			queries: vec![DehydratedQuery {
				operation: "posts.getAll".into(),
				input: "null".into(),
				data: serde_json::json!([]),
				updated_at: Utc::now(),
			}],
		};

		let html = document("t", "", Some(&snapshot));

		assert!(html.contains(super::SNAPSHOT_ELEMENT_ID));
		assert!(html.contains("posts.getAll"));
	}

	#[test]
	fn test_not_found_keeps_default_title() {
		let page = Page::not_found();

		assert_eq!(page.status, 404);
		assert!(page.render().contains("<title>Chirp</title>"));
		assert!(page.render().contains("404"));
	}
}
