/// Storage layer for user records
///
/// Handlers talk to a [`UserStore`]; the Postgres adapter is used in
/// deployments and the in-memory adapter in development and tests.
/// Authorization never touches storage.
pub mod memory;
pub mod postgres;

use crate::models::{NewUser, User};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryUserStore;
pub use postgres::PostgresUserStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no options provided")]
    NoOptions,

    #[error("username already exists: {0}")]
    AlreadyExists(String),

    #[error("stored record is invalid: {0}")]
    CorruptRecord(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Composable lookup predicate
///
/// A list of options is combined with AND; [`QueryOption::Or`] groups
/// alternatives. An empty `Or` matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOption {
    IdEq(i64),
    UsernameEq(String),
    /// Case-insensitive substring match on the username
    UsernameFuzzy(String),
    Or(Vec<QueryOption>),
}

impl QueryOption {
    pub fn any_of(options: impl IntoIterator<Item = QueryOption>) -> Self {
        QueryOption::Or(options.into_iter().collect())
    }

    /// Evaluate against an in-memory record
    pub fn matches(&self, user: &User) -> bool {
        match self {
            QueryOption::IdEq(id) => user.id == *id,
            QueryOption::UsernameEq(name) => user.username == *name,
            QueryOption::UsernameFuzzy(fragment) => user
                .username
                .to_lowercase()
                .contains(&fragment.to_lowercase()),
            QueryOption::Or(options) => options.iter().any(|option| option.matches(user)),
        }
    }
}

/// Persistence contract used by the business handlers
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; a taken username fails with [`StoreError::AlreadyExists`]
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Fetch the first user matching every option
    ///
    /// Zero options is an error, never "any user". Not found is `Ok(None)`.
    async fn get_user(&self, options: &[QueryOption]) -> Result<Option<User>, StoreError>;

    /// One page of users matching every option, ordered by id, plus the total
    /// number of matches. `page` is 1-based; zero options lists everyone.
    async fn get_users(
        &self,
        page: u32,
        page_size: u32,
        options: &[QueryOption],
    ) -> Result<(Vec<User>, i64), StoreError>;
}

/// Rows to skip for a 1-based page
pub(crate) fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(page_size)
}
