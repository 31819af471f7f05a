/// PostgreSQL user store
use super::{page_offset, QueryOption, StoreError, UserStore};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crypto_core::jwt::Role;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

/// Table definition the adapter expects
pub const SCHEMA: &str = include_str!("../../migrations/0001_create_users.sql");

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e| StoreError::CorruptRecord(format!("user {}: {e}", row.id)))?;

        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the users table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

/// Escape LIKE metacharacters so user input matches literally
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_option(builder: &mut QueryBuilder<'_, Postgres>, option: &QueryOption) {
    match option {
        QueryOption::IdEq(id) => {
            builder.push("id = ").push_bind(*id);
        }
        QueryOption::UsernameEq(name) => {
            builder.push("username = ").push_bind(name.clone());
        }
        QueryOption::UsernameFuzzy(fragment) => {
            builder
                .push("username ILIKE ")
                .push_bind(like_pattern(fragment))
                .push(" ESCAPE '\\'");
        }
        QueryOption::Or(options) if options.is_empty() => {
            builder.push("FALSE");
        }
        QueryOption::Or(options) => {
            builder.push("(");
            for (i, nested) in options.iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                push_option(builder, nested);
            }
            builder.push(")");
        }
    }
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, options: &[QueryOption]) {
    for (i, option) in options.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        push_option(builder, option);
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::AlreadyExists(user.username.clone())
            }
            other => other.into(),
        })?;

        row.try_into()
    }

    async fn get_user(&self, options: &[QueryOption]) -> Result<Option<User>, StoreError> {
        if options.is_empty() {
            return Err(StoreError::NoOptions);
        }

        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_where(&mut builder, options);
        builder.push(" ORDER BY id LIMIT 1");

        debug!(sql = builder.sql(), "get_user");
        builder
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn get_users(
        &self,
        page: u32,
        page_size: u32,
        options: &[QueryOption],
    ) -> Result<(Vec<User>, i64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_where(&mut count, options);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_where(&mut select, options);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page_offset(page, page_size)).unwrap_or(i64::MAX));

        let users = select
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("ali"), "%ali%");
        assert_eq!(like_pattern("a_b%c\\"), "%a\\_b\\%c\\\\%");
    }

    #[test]
    fn test_where_clause_rendering() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM users");
        push_where(
            &mut builder,
            &[
                QueryOption::any_of([
                    QueryOption::UsernameFuzzy("al".into()),
                    QueryOption::IdEq(4),
                ]),
                QueryOption::UsernameEq("alice".into()),
            ],
        );

        assert_eq!(
            builder.sql(),
            "SELECT id FROM users WHERE (username ILIKE $1 ESCAPE '\\' OR id = $2) AND username = $3"
        );
    }

    #[test]
    fn test_empty_or_matches_nothing() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM users");
        push_where(&mut builder, &[QueryOption::Or(vec![])]);

        assert_eq!(builder.sql(), "SELECT id FROM users WHERE FALSE");
    }

    #[test]
    fn test_row_with_unknown_role_is_corrupt() {
        let row = UserRow {
            id: 1,
            username: "alice".into(),
            password_hash: "x".into(),
            role: "superuser".into(),
            created_at: Utc::now(),
        };

        match User::try_from(row) {
            Err(StoreError::CorruptRecord(detail)) => assert!(detail.contains("unknown role")),
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }
}
