// Shared fixtures for user-service integration tests
#![allow(dead_code)]

use crypto_core::jwt::{Role, TokenAuthenticator};
use parking_lot::Mutex;
use std::sync::Arc;
use tonic::metadata::MetadataValue;
use tonic::{Code, Request};
use user_service::app;
use user_service::db::{MemoryUserStore, QueryOption, UserStore};
use user_service::middleware::{RateLimiter, RequestLog, RequestRecord};
use user_service::UsersServiceImpl;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ADMIN_USERNAME: &str = "root_admin";
pub const ADMIN_PASSWORD: &str = "admin-password-123";

/// One finished call as reported to the log
#[derive(Debug, Clone, PartialEq)]
pub struct Finished {
    pub route: String,
    pub correlation_id: String,
    pub code: Code,
    pub user_id: Option<i64>,
}

/// `RequestLog` that keeps every event for assertions
#[derive(Debug, Default)]
pub struct RecordingLog {
    pub started: Mutex<Vec<(String, String)>>,
    pub finished: Mutex<Vec<Finished>>,
}

impl RequestLog for RecordingLog {
    fn request_started(&self, route: &str, correlation_id: &str) {
        self.started
            .lock()
            .push((route.to_string(), correlation_id.to_string()));
    }

    fn request_finished(&self, record: &RequestRecord<'_>) {
        self.finished.lock().push(Finished {
            route: record.route.to_string(),
            correlation_id: record.correlation_id.to_string(),
            code: record.code,
            user_id: record.user_id,
        });
    }
}

impl RecordingLog {
    pub fn last_finished(&self) -> Option<Finished> {
        self.finished.lock().last().cloned()
    }
}

pub struct TestApp {
    pub service: Arc<UsersServiceImpl>,
    pub tokens: Arc<TokenAuthenticator>,
    pub store: Arc<MemoryUserStore>,
    pub log: Arc<RecordingLog>,
}

impl TestApp {
    /// Generous limiter, empty in-memory store
    pub fn new() -> Self {
        Self::with_limiter(RateLimiter::new(1_000, 1_000.0).unwrap())
    }

    pub fn with_limiter(limiter: RateLimiter) -> Self {
        let tokens = Arc::new(TokenAuthenticator::new(SECRET, 7).unwrap());
        let store = Arc::new(MemoryUserStore::new());
        let log = Arc::new(RecordingLog::default());

        let service = app::build_service(
            Arc::clone(&tokens),
            Arc::new(limiter),
            Arc::clone(&store) as Arc<dyn UserStore>,
            Arc::clone(&log) as Arc<dyn RequestLog>,
        )
        .unwrap();

        Self {
            service,
            tokens,
            store,
            log,
        }
    }

    /// Bootstrap the admin account and return its token
    pub async fn admin_token(&self) -> String {
        self.service
            .ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .unwrap();
        let admin = self
            .store
            .get_user(&[QueryOption::UsernameEq(ADMIN_USERNAME.to_string())])
            .await
            .unwrap()
            .unwrap();
        self.tokens
            .generate(admin.id, &admin.username, Role::Admin)
            .unwrap()
    }
}

/// Request carrying `Authorization: Bearer <token>`
pub fn authorized<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request.metadata_mut().insert(
        "authorization",
        MetadataValue::try_from(format!("Bearer {token}")).unwrap(),
    );
    request
}
