// Interceptor chain behaviour observed through the service entry points
//
// Every test drives `UsersService` (or the chain itself) in-process against
// the in-memory store, so no database or network is needed:
//   cargo test -p user-service --test chain_tests

mod common;

use common::{authorized, RecordingLog, TestApp, ADMIN_PASSWORD, ADMIN_USERNAME, SECRET};
use async_trait::async_trait;
use crypto_core::jwt::{Role, TokenAuthenticator};
use grpc_jwt_propagation::BearerAuthenticator;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataValue;
use tonic::{Code, Request, Status};
use user_service::grpc::users::users_service_server::UsersService;
use user_service::grpc::users::*;
use user_service::grpc::users::Role as WireRole;
use user_service::grpc::{default_policy, routes};
use user_service::app;
use user_service::db::{MemoryUserStore, QueryOption, StoreError, UserStore};
use user_service::middleware::{attach_cancellation, InterceptorChain, RateLimiter, RouteMessage};
use user_service::models::{NewUser, User as UserRecord};
use validator::{Validate, ValidationErrors};

fn signup(username: &str, password: &str) -> CreateUserRequest {
    CreateUserRequest {
        username: username.to_string(),
        password: password.to_string(),
    }
}

async fn create(app: &TestApp, username: &str) -> CreateUserResponse {
    app.service
        .create_user(Request::new(signup(username, "correct-horse")))
        .await
        .expect("create user")
        .into_inner()
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_create_login_and_get_me() {
    let app = TestApp::new();

    let created = create(&app, "alice").await;
    let user = created.user.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.role, WireRole::Default as i32);
    assert!(!created.token.is_empty());

    let login = app
        .service
        .login(Request::new(LoginRequest {
            username: "alice".into(),
            password: "correct-horse".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(login.user.as_ref().unwrap().id, user.id);

    let me = app
        .service
        .get_me(authorized(GetMeRequest {}, &login.token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(me.user.unwrap().username, "alice");

    let finished = app.log.last_finished().unwrap();
    assert_eq!(finished.route, routes::GET_ME);
    assert_eq!(finished.code, Code::Ok);
    assert_eq!(finished.user_id, Some(user.id));
}

#[tokio::test]
async fn test_correlation_id_is_reused() {
    let app = TestApp::new();

    let mut request = Request::new(GetMeRequest {});
    request
        .metadata_mut()
        .insert("x-correlation-id", MetadataValue::from_static("trace-42"));
    let _ = app.service.get_me(request).await;

    let started = app.log.started.lock().clone();
    assert_eq!(started, vec![(routes::GET_ME.to_string(), "trace-42".to_string())]);
    assert_eq!(app.log.last_finished().unwrap().correlation_id, "trace-42");
}

#[tokio::test]
async fn test_generated_correlation_ids_are_unique() {
    let app = TestApp::new();

    let _ = app.service.get_me(Request::new(GetMeRequest {})).await;
    let _ = app.service.get_me(Request::new(GetMeRequest {})).await;

    let started = app.log.started.lock().clone();
    assert_eq!(started.len(), 2);
    assert_ne!(started[0].1, started[1].1);
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rate_limit_rejects_before_logging() {
    let app = TestApp::with_limiter(RateLimiter::new(2, 1.0).unwrap());
    let call = || app.service.get_me(Request::new(GetMeRequest {}));

    assert_eq!(call().await.unwrap_err().code(), Code::Unauthenticated);
    assert_eq!(call().await.unwrap_err().code(), Code::Unauthenticated);

    let limited = call().await.unwrap_err();
    assert_eq!(limited.code(), Code::ResourceExhausted);
    assert_eq!(limited.message(), "rate limit exceeded");

    // Only admitted calls are logged
    assert_eq!(app.log.started.lock().len(), 2);
    assert_eq!(app.log.finished.lock().len(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(call().await.unwrap_err().code(), Code::Unauthenticated);
    assert_eq!(app.log.started.lock().len(), 3);
}

// ============================================================================
// Authentication and authorization
// ============================================================================

#[tokio::test]
async fn test_token_from_other_secret_is_unauthenticated() {
    let app = TestApp::new();
    let created = create(&app, "mallory").await;
    let forged = TokenAuthenticator::new(b"some-other-secret", 7)
        .unwrap()
        .generate(created.user.unwrap().id, "mallory", Role::Admin)
        .unwrap();

    let status = app
        .service
        .get_me(authorized(GetMeRequest {}, &forged))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
    assert_eq!(status.message(), "missing or invalid credentials");
    assert_eq!(app.log.last_finished().unwrap().code, Code::Unauthenticated);
}

#[tokio::test]
async fn test_missing_credentials_on_protected_route() {
    let app = TestApp::new();

    let status = app
        .service
        .get_user(Request::new(GetUserRequest { id: 1 }))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_public_route_ignores_garbage_credentials() {
    let app = TestApp::new();

    let response = app
        .service
        .create_user(authorized(signup("bob", "correct-horse"), "not-a-jwt"))
        .await;

    assert!(response.is_ok());
    assert_eq!(app.log.last_finished().unwrap().user_id, None);
}

#[tokio::test]
async fn test_get_user_is_self_only() {
    let app = TestApp::new();
    let alice = create(&app, "alice").await;
    let bob = create(&app, "bob").await;
    let alice_id = alice.user.unwrap().id;
    let bob_id = bob.user.unwrap().id;

    let own = app
        .service
        .get_user(authorized(GetUserRequest { id: alice_id }, &alice.token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(own.user.unwrap().id, alice_id);

    let other = app
        .service
        .get_user(authorized(GetUserRequest { id: bob_id }, &alice.token))
        .await
        .unwrap_err();
    assert_eq!(other.code(), Code::PermissionDenied);
    assert_eq!(other.message(), "permission denied");

    // Admins get no exemption on self-only routes
    let admin_token = app.admin_token().await;
    let by_admin = app
        .service
        .get_user(authorized(GetUserRequest { id: bob_id }, &admin_token))
        .await
        .unwrap_err();
    assert_eq!(by_admin.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_list_users_requires_admin() {
    let app = TestApp::new();
    let alice = create(&app, "alice").await;
    create(&app, "albert").await;
    create(&app, "carol").await;

    let denied = app
        .service
        .list_users(authorized(ListUsersRequest::default(), &alice.token))
        .await
        .unwrap_err();
    assert_eq!(denied.code(), Code::PermissionDenied);

    let admin_token = app.admin_token().await;
    let all = app
        .service
        .list_users(authorized(ListUsersRequest::default(), &admin_token))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(all.total_count, 4);
    assert_eq!(all.users.len(), 4);

    let filtered = app
        .service
        .list_users(authorized(
            ListUsersRequest {
                page: 1,
                page_size: 1,
                search: "AL".into(),
            },
            &admin_token,
        ))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(filtered.total_count, 2);
    assert_eq!(filtered.users.len(), 1);
    assert!(filtered.users[0].username.starts_with("al"));
}

// ============================================================================
// Handler outcomes
// ============================================================================

#[tokio::test]
async fn test_duplicate_username() {
    let app = TestApp::new();
    create(&app, "alice").await;

    let status = app
        .service
        .create_user(Request::new(signup("alice", "another-password")))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::AlreadyExists);
    assert_eq!(status.message(), "username already exists");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    create(&app, "alice").await;

    let wrong_password = app
        .service
        .login(Request::new(LoginRequest {
            username: "alice".into(),
            password: "incorrect".into(),
        }))
        .await
        .unwrap_err();
    let unknown_user = app
        .service
        .login(Request::new(LoginRequest {
            username: "nobody".into(),
            password: "incorrect".into(),
        }))
        .await
        .unwrap_err();

    assert_eq!(wrong_password.code(), Code::Unauthenticated);
    assert_eq!(wrong_password.message(), unknown_user.message());
    assert_eq!(unknown_user.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_admin_bootstrap_login() {
    let app = TestApp::new();
    app.admin_token().await;
    // Second run leaves the existing account alone
    assert!(!app
        .service
        .ensure_admin(ADMIN_USERNAME, "different-password")
        .await
        .unwrap());

    let login = app
        .service
        .login(Request::new(LoginRequest {
            username: ADMIN_USERNAME.into(),
            password: ADMIN_PASSWORD.into(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(login.user.unwrap().role, WireRole::Admin as i32);
}

#[tokio::test]
async fn test_deleted_subject_is_not_found() {
    let app = TestApp::new();
    let token = app.tokens.generate(999, "ghost", Role::Default).unwrap();

    let status = app
        .service
        .get_user(authorized(GetUserRequest { id: 999 }, &token))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::NotFound);
    assert_eq!(status.message(), "user not found");
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_required_field_hides_other_violations() {
    let app = TestApp::new();

    let status = app
        .service
        .create_user(Request::new(signup("", "correct-horse")))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "username is required");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_all_violations_are_reported() {
    let app = TestApp::new();

    let status = app
        .service
        .create_user(Request::new(signup("a!", "short")))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    let message = status.message();
    assert!(message.starts_with("password length must be between 8 and 72"));
    assert!(message.contains("username length must be between 3 and 32"));
    assert!(message.contains("username value has an invalid format"));
}

#[tokio::test]
async fn test_page_size_bound() {
    let app = TestApp::new();
    let admin_token = app.admin_token().await;

    let status = app
        .service
        .list_users(authorized(
            ListUsersRequest {
                page_size: 101,
                ..Default::default()
            },
            &admin_token,
        ))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "page_size must be less than or equal to 100");
}

#[tokio::test]
async fn test_invalid_get_user_without_credentials_is_unauthenticated() {
    let app = TestApp::new();
    let alice = create(&app, "alice").await;

    let anonymous = app
        .service
        .get_user(Request::new(GetUserRequest { id: 0 }))
        .await
        .unwrap_err();
    assert_eq!(anonymous.code(), Code::Unauthenticated);

    // Someone else's (invalid) id is a policy failure before it is a field failure
    let other = app
        .service
        .get_user(authorized(GetUserRequest { id: 0 }, &alice.token))
        .await
        .unwrap_err();
    assert_eq!(other.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_oversized_page_for_default_role_is_permission_denied() {
    let app = TestApp::new();
    let alice = create(&app, "alice").await;

    let status = app
        .service
        .list_users(authorized(
            ListUsersRequest {
                page_size: 101,
                ..Default::default()
            },
            &alice.token,
        ))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::PermissionDenied);
    assert_eq!(app.log.last_finished().unwrap().code, Code::PermissionDenied);
}

/// A message whose validation itself blows up
#[derive(Debug)]
struct Exploding;

impl Validate for Exploding {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let rules: Option<()> = None;
        rules.expect("rule table missing");
        Ok(())
    }
}

impl RouteMessage for Exploding {}

fn bare_chain(log: Arc<RecordingLog>) -> InterceptorChain {
    let tokens = Arc::new(TokenAuthenticator::new(SECRET, 7).unwrap());
    InterceptorChain::new(
        Arc::new(RateLimiter::new(100, 100.0).unwrap()),
        BearerAuthenticator::new(tokens),
        Arc::new(default_policy().unwrap()),
        log,
    )
}

#[tokio::test]
async fn test_validation_engine_failure() {
    let log = Arc::new(RecordingLog::default());
    let chain = bare_chain(log.clone());

    let status = chain
        .run(routes::CREATE_USER, Request::new(Exploding), |_, _| async {
            Ok::<_, Status>(())
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().starts_with("validation runtime error: "));
    assert_eq!(log.last_finished().unwrap().code, Code::InvalidArgument);
}

// ============================================================================
// Cancellation and recovery
// ============================================================================

#[tokio::test]
async fn test_cancelled_call_never_reaches_handler() {
    let app = TestApp::new();
    let token = CancellationToken::new();
    token.cancel();

    let mut request = Request::new(signup("alice", "correct-horse"));
    attach_cancellation(&mut request, token);
    let status = app.service.create_user(request).await.unwrap_err();

    assert_eq!(status.code(), Code::Cancelled);
    assert!(app.store.is_empty());
    assert_eq!(app.log.last_finished().unwrap().code, Code::Cancelled);
}

#[tokio::test]
async fn test_expired_deadline_never_reaches_handler() {
    let app = TestApp::new();

    let mut request = Request::new(signup("alice", "correct-horse"));
    request
        .metadata_mut()
        .insert("grpc-timeout", MetadataValue::from_static("0m"));
    let status = app.service.create_user(request).await.unwrap_err();

    assert_eq!(status.code(), Code::DeadlineExceeded);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_live_token_lets_call_through() {
    let app = TestApp::new();

    let mut request = Request::new(signup("alice", "correct-horse"));
    attach_cancellation(&mut request, CancellationToken::new());
    request
        .metadata_mut()
        .insert("grpc-timeout", MetadataValue::from_static("30S"));

    assert!(app.service.create_user(request).await.is_ok());
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_handler_panic_becomes_internal() {
    let log = Arc::new(RecordingLog::default());
    let chain = bare_chain(log.clone());

    let status = chain
        .run(
            routes::CREATE_USER,
            Request::new(signup("alice", "correct-horse")),
            |_, _| async {
                let user: Option<CreateUserResponse> = None;
                Ok::<_, Status>(user.expect("handler lost its user"))
            },
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.message(), "internal error");
    assert_eq!(log.last_finished().unwrap().code, Code::Internal);

    // The chain keeps serving after a panic
    let ok = chain
        .run(
            routes::CREATE_USER,
            Request::new(signup("alice", "correct-horse")),
            |ctx, _| async move { Ok::<_, Status>(ctx.route()) },
        )
        .await
        .unwrap();
    assert_eq!(ok.into_inner(), routes::CREATE_USER);
}

#[tokio::test]
async fn test_handler_panic_before_first_poll_becomes_internal() {
    let log = Arc::new(RecordingLog::default());
    let chain = bare_chain(log.clone());

    let status = chain
        .run(
            routes::CREATE_USER,
            Request::new(signup("alice", "correct-horse")),
            |_, _| {
                let store: Option<()> = None;
                store.expect("handler built without a store");
                async { Ok::<_, Status>(()) }
            },
        )
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Internal);
    assert_eq!(status.message(), "internal error");
    assert_eq!(log.last_finished().unwrap().code, Code::Internal);
}

// ============================================================================
// Admin bootstrap across replicas
// ============================================================================

/// Store whose lookups never see existing users, as when another replica
/// inserts between the lookup and the insert
struct LateLookupStore(MemoryUserStore);

#[async_trait]
impl UserStore for LateLookupStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        self.0.create_user(user).await
    }

    async fn get_user(&self, _options: &[QueryOption]) -> Result<Option<UserRecord>, StoreError> {
        Ok(None)
    }

    async fn get_users(
        &self,
        page: u32,
        page_size: u32,
        options: &[QueryOption],
    ) -> Result<(Vec<UserRecord>, i64), StoreError> {
        self.0.get_users(page, page_size, options).await
    }
}

#[tokio::test]
async fn test_admin_bootstrap_tolerates_concurrent_insert() {
    let tokens = Arc::new(TokenAuthenticator::new(SECRET, 7).unwrap());
    let service = app::build_service(
        tokens,
        Arc::new(RateLimiter::new(100, 100.0).unwrap()),
        Arc::new(LateLookupStore(MemoryUserStore::new())),
        Arc::new(RecordingLog::default()),
    )
    .unwrap();

    assert!(service.ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap());
    // The insert loses to the existing row
    assert!(!service.ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap());
}

#[tokio::test]
async fn test_parallel_admin_bootstrap_creates_one_account() {
    let app = TestApp::new();

    let (first, second) = tokio::join!(
        app.service.ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD),
        app.service.ensure_admin(ADMIN_USERNAME, ADMIN_PASSWORD),
    );

    assert_eq!(first.unwrap() as u8 + second.unwrap() as u8, 1);
    assert_eq!(app.store.len(), 1);
}
