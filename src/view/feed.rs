use chrono::{DateTime, Utc};

use super::{escape, failed, loading, placeholder, time_ago};
use crate::{
	query::{QueryError, QueryState},
	route::post::model::PostWithAuthor,
};

/// What a feed shows for the state of its query.
#[derive(Debug, PartialEq)]
pub enum FeedView<'a> {
	Loading,
	Failed(&'a QueryError),
	Empty,
	Rows(&'a [PostWithAuthor]),
}

impl<'a> FeedView<'a> {
	pub fn from_state(state: &'a QueryState<Vec<PostWithAuthor>>) -> Self {
		match state {
			QueryState::Pending => Self::Loading,
			QueryState::Failed(error) => Self::Failed(error),
			QueryState::Ready(posts) if posts.is_empty() => Self::Empty,
			QueryState::Ready(posts) => Self::Rows(posts),
		}
	}

	pub fn render(&self, now: DateTime<Utc>) -> String {
		match self {
			Self::Loading => loading(),
			Self::Failed(..) => failed(),
			Self::Empty => placeholder("No posts yet"),
			Self::Rows(posts) => {
				let rows = posts
					.iter()
					.map(|post| post_view(post, now))
					.collect::<String>();

				format!("<div class=\"feed\">{rows}</div>")
			}
		}
	}
}

/// A single row of a feed, keyed by the post id.
pub fn post_view(row: &PostWithAuthor, now: DateTime<Utc>) -> String {
	let PostWithAuthor { post, author } = row;
	let handle = escape(author.handle());
	let profile = if handle.is_empty() {
		"<span>@</span>".to_owned()
	} else {
		format!("<a href=\"/@{handle}\"><span>@{handle}</span></a>")
	};

	format!(
		"<article class=\"post\" data-key=\"{id}\">\
		 <img class=\"avatar\" src=\"{image}\" alt=\"@{handle}'s profile picture\" width=\"56\" height=\"56\">\
		 <div><div class=\"post-meta\">\
		 {profile}\
		 <a href=\"/post/{id}\"><span>· {time}</span></a>\
		 </div><span class=\"post-content\">{content}</span></div></article>",
		id = post.id,
		image = escape(&author.profile_image_url),
		time = time_ago(post.created_at, now),
		content = escape(&post.content),
	)
}

#[cfg(test)]
mod test {
	use chrono::{Duration, Utc};
	use uuid::Uuid;

	use super::{post_view, FeedView};
	use crate::{
		query::{QueryError, QueryState},
		route::post::model::{Author, Post, PostWithAuthor},
	};

	fn row(username: Option<&str>, content: &str, minutes_ago: i64) -> PostWithAuthor {
		let author = Uuid::new_v4();

		PostWithAuthor {
			post: Post {
				id: Uuid::new_v4(),
				author_id: author,
				content: content.into(),
				created_at: Utc::now() - Duration::minutes(minutes_ago),
			},
			author: Author {
				id: author,
				username: username.map(Into::into),
				profile_image_url: "https://example.com/a.png".into(),
			},
		}
	}

	#[test]
	fn test_rows_keep_input_order_and_keys() {
		let posts = vec![row(Some("a"), "first", 1), row(Some("b"), "second", 2)];
		let state = QueryState::Ready(posts.clone());
		let html = FeedView::from_state(&state).render(Utc::now());

		let first = html.find(&posts[0].post.id.to_string()).unwrap();
		let second = html.find(&posts[1].post.id.to_string()).unwrap();

		assert!(first < second);
		assert_eq!(html.matches("data-key=").count(), 2);
		assert!(html.contains(&format!("data-key=\"{}\"", posts[0].post.id)));
	}

	#[test]
	fn test_empty_pending_and_failed_are_distinct() {
		let empty = QueryState::Ready(Vec::new());
		let pending = QueryState::Pending;
		let failed = QueryState::Failed(QueryError {
			operation: "posts.getAll".into(),
			message: "boom".into(),
		});

		assert_eq!(FeedView::from_state(&empty), FeedView::Empty);
		assert_eq!(FeedView::from_state(&pending), FeedView::Loading);
		assert!(matches!(FeedView::from_state(&failed), FeedView::Failed(..)));

		let now = Utc::now();

		assert!(FeedView::Empty.render(now).contains("No posts yet"));
		assert!(FeedView::Loading.render(now).contains("Loading"));
		assert!(FeedView::from_state(&failed)
			.render(now)
			.contains("Something went wrong"));
	}

	#[test]
	fn test_row_shows_handle_time_and_escaped_content() {
		let post = row(Some("alice"), "<b>hi</b>", 3);
		let html = post_view(&post, Utc::now());

		assert!(html.contains("@alice"));
		assert!(html.contains("· 3 minutes ago"));
		assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
		assert!(!html.contains("<b>"));
	}

	#[test]
	fn test_missing_username_renders_empty_handle() {
		let html = post_view(&row(None, "hello", 0), Utc::now());

		assert!(html.contains("<span>@</span>"));
		assert!(!html.contains("href=\"/@\""));
		assert!(!html.contains("None"));

		let html = post_view(&row(Some("alice"), "hello", 0), Utc::now());

		assert!(html.contains("<a href=\"/@alice\"><span>@alice</span></a>"));
	}
}
