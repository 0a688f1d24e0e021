use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A serializable copy of the ready entries of a query cache, used to hand
/// data fetched while building a page to the client that renders it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
	pub queries: Vec<DehydratedQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DehydratedQuery {
	pub operation: String,
	/// The serialized input, as found in the cache key.
	pub input: String,
	pub data: serde_json::Value,
	pub updated_at: DateTime<Utc>,
}

impl Snapshot {
	pub fn is_empty(&self) -> bool {
		self.queries.is_empty()
	}

	/// The snapshot as JSON that is safe to embed in a `<script>` element.
	pub fn to_script_json(&self) -> String {
		serde_json::to_string(self)
			.unwrap_or_default()
			.replace("</", "<\\/")
	}
}
