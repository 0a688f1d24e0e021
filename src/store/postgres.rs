use uuid::Uuid;

use super::{Error, NewUser, Store};
use crate::{
	route::{
		auth::model::{Session, User},
		post::model::{Post, PostWithAuthor},
		profile::model::Author,
	},
	Database,
};

/// A post joined with the columns of its author.
#[derive(sqlx::FromRow)]
struct PostRow {
	id: Uuid,
	author_id: Uuid,
	content: String,
	created_at: chrono::DateTime<chrono::Utc>,
	username: Option<String>,
	profile_image_url: String,
}

impl From<PostRow> for PostWithAuthor {
	fn from(row: PostRow) -> Self {
		Self {
			post: Post {
				id: row.id,
				author_id: row.author_id,
				content: row.content,
				created_at: row.created_at,
			},
			author: Author {
				id: row.author_id,
				username: row.username,
				profile_image_url: row.profile_image_url,
			},
		}
	}
}

const SELECT_POST_WITH_AUTHOR: &str = r#"
	SELECT post.id, post.author_id, post.content, post.created_at,
		"user".username, "user".profile_image_url
	FROM post
	JOIN "user" ON "user".id = post.author_id
"#;

/// Maps unique violations of the user table to their errors.
fn register_error(error: sqlx::Error) -> Error {
	if let sqlx::Error::Database(ref database) = error {
		match database.constraint() {
			Some("user_email_key") => return Error::EmailTaken,
			Some("user_username_key") => return Error::UsernameTaken,
			_ => {}
		}
	}

	Error::Database(error)
}

#[axum::async_trait]
impl Store for Database {
	async fn recent_posts(&self, limit: i64) -> Result<Vec<PostWithAuthor>, Error> {
		let rows = sqlx::query_as::<_, PostRow>(&format!(
			"{SELECT_POST_WITH_AUTHOR} ORDER BY post.created_at DESC LIMIT $1"
		))
		.bind(limit)
		.fetch_all(self)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	async fn posts_by_author(
		&self,
		author_id: Uuid,
		limit: i64,
	) -> Result<Vec<PostWithAuthor>, Error> {
		let rows = sqlx::query_as::<_, PostRow>(&format!(
			"{SELECT_POST_WITH_AUTHOR} WHERE post.author_id = $1 ORDER BY post.created_at DESC LIMIT $2"
		))
		.bind(author_id)
		.bind(limit)
		.fetch_all(self)
		.await?;

		Ok(rows.into_iter().map(Into::into).collect())
	}

	async fn post(&self, id: Uuid) -> Result<Option<PostWithAuthor>, Error> {
		let row = sqlx::query_as::<_, PostRow>(&format!(
			"{SELECT_POST_WITH_AUTHOR} WHERE post.id = $1"
		))
		.bind(id)
		.fetch_optional(self)
		.await?;

		Ok(row.map(Into::into))
	}

	async fn create_post(&self, author_id: Uuid, content: &str) -> Result<Post, Error> {
		let post = sqlx::query_as::<_, Post>(
			r#"
				INSERT INTO post (id, author_id, content)
				VALUES (DEFAULT, $1, $2)
				RETURNING *
			"#,
		)
		.bind(author_id)
		.bind(content)
		.fetch_one(self)
		.await?;

		Ok(post)
	}

	async fn author_by_username(&self, username: &str) -> Result<Option<Author>, Error> {
		let author = sqlx::query_as::<_, Author>(
			r#"SELECT id, username, profile_image_url FROM "user" WHERE username = $1"#,
		)
		.bind(username)
		.fetch_optional(self)
		.await?;

		Ok(author)
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
		let user = sqlx::query_as::<_, User>(r#"SELECT * FROM "user" WHERE email = $1"#)
			.bind(email)
			.fetch_optional(self)
			.await?;

		Ok(user)
	}

	async fn register(&self, user: NewUser) -> Result<Session, Error> {
		let mut tx = self.begin().await?;

		sqlx::query(
			r#"
				INSERT INTO "user" (id, email, username, password, profile_image_url)
				VALUES ($1, $2, $3, $4, $5)
			"#,
		)
		.bind(user.id)
		.bind(&user.email)
		.bind(&user.username)
		.bind(&user.password)
		.bind(&user.profile_image_url)
		.execute(&mut *tx)
		.await
		.map_err(register_error)?;

		let session = sqlx::query_as::<_, Session>(
			"INSERT INTO session (user_id) VALUES ($1) RETURNING *",
		)
		.bind(user.id)
		.fetch_one(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok(session)
	}

	async fn create_session(&self, user_id: Uuid) -> Result<Session, Error> {
		let session = sqlx::query_as::<_, Session>(
			"INSERT INTO session (user_id) VALUES ($1) RETURNING *",
		)
		.bind(user_id)
		.fetch_one(self)
		.await?;

		Ok(session)
	}

	async fn session_user(&self, session_id: Uuid) -> Result<Option<User>, Error> {
		let user = sqlx::query_as::<_, User>(
			r#"
				SELECT * FROM "user" WHERE id = (
					SELECT user_id FROM session WHERE id = $1
				)
			"#,
		)
		.bind(session_id)
		.fetch_optional(self)
		.await?;

		Ok(user)
	}

	async fn delete_session(&self, session_id: Uuid) -> Result<(), Error> {
		sqlx::query("DELETE FROM session WHERE id = $1")
			.bind(session_id)
			.execute(self)
			.await?;

		Ok(())
	}
}
