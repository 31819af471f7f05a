/// In-memory user store for development and tests
use super::{page_offset, QueryOption, StoreError, UserStore};
use crate::models::{NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    next_id: i64,
}

/// Process-local store; ids start at 1 and increase monotonically
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    state: RwLock<State>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut state = self.state.write();

        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::AlreadyExists(user.username));
        }

        state.next_id += 1;
        let created = User {
            id: state.next_id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.push(created.clone());

        Ok(created)
    }

    async fn get_user(&self, options: &[QueryOption]) -> Result<Option<User>, StoreError> {
        if options.is_empty() {
            return Err(StoreError::NoOptions);
        }

        let state = self.state.read();
        Ok(state
            .users
            .iter()
            .find(|user| options.iter().all(|option| option.matches(user)))
            .cloned())
    }

    async fn get_users(
        &self,
        page: u32,
        page_size: u32,
        options: &[QueryOption],
    ) -> Result<(Vec<User>, i64), StoreError> {
        let state = self.state.read();
        let matching: Vec<&User> = state
            .users
            .iter()
            .filter(|user| options.iter().all(|option| option.matches(user)))
            .collect();

        let total = matching.len() as i64;
        let offset = usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX);
        let users = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();

        Ok((users, total))
    }
}
