/// gRPC server implementation for user-service
///
/// Implements all RPCs from users_service.proto:
/// - Account creation and login: CreateUser, Login
/// - User queries: GetUser, GetMe, ListUsers
///
/// Every RPC enters through the [`InterceptorChain`]; the handlers below only
/// run for calls that passed rate limiting, authorization and validation.
use super::routes;
use super::users::users_service_server::UsersService;
use super::users::*;
use crate::db::{QueryOption, UserStore};
use crate::error::UsersError;
use crate::middleware::{CallContext, InterceptorChain};
use crate::models::{NewUser, User as UserRecord};
use crate::security::{hash_password, verify_password};
use crypto_core::jwt::{Role, TokenAuthenticator};
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::info;

const DEFAULT_PAGE_SIZE: u32 = 20;

/// User service gRPC server
#[derive(Clone)]
pub struct UsersServiceImpl {
    chain: Arc<InterceptorChain>,
    store: Arc<dyn UserStore>,
    tokens: Arc<TokenAuthenticator>,
}

impl std::fmt::Debug for UsersServiceImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsersServiceImpl")
            .field("chain", &self.chain)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl UsersServiceImpl {
    pub fn new(
        chain: Arc<InterceptorChain>,
        store: Arc<dyn UserStore>,
        tokens: Arc<TokenAuthenticator>,
    ) -> Self {
        Self {
            chain,
            store,
            tokens,
        }
    }

    fn issue_token(&self, user: &UserRecord) -> Result<String, UsersError> {
        Ok(self.tokens.generate(user.id, &user.username, user.role)?)
    }

    async fn find_user(&self, option: QueryOption) -> Result<UserRecord, UsersError> {
        self.store
            .get_user(&[option])
            .await?
            .ok_or(UsersError::UserNotFound)
    }

    async fn handle_create_user(&self, req: CreateUserRequest) -> Result<CreateUserResponse, UsersError> {
        let CreateUserRequest { username, password } = req;

        // Argon2 is CPU-bound
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let user = self
            .store
            .create_user(NewUser::new(username, password_hash))
            .await?;
        let token = self.issue_token(&user)?;

        info!(user_id = user.id, username = %user.username, "User created");

        Ok(CreateUserResponse {
            user: Some(User::from(&user)),
            token,
        })
    }

    async fn handle_login(&self, req: LoginRequest) -> Result<LoginResponse, UsersError> {
        let LoginRequest { username, password } = req;

        let user = self
            .store
            .get_user(&[QueryOption::UsernameEq(username)])
            .await?
            .ok_or(UsersError::InvalidCredentials)?;

        let stored_hash = user.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await??;
        if !verified {
            return Err(UsersError::InvalidCredentials);
        }

        let token = self.issue_token(&user)?;
        info!(user_id = user.id, "User logged in");

        Ok(LoginResponse {
            user: Some(User::from(&user)),
            token,
        })
    }

    async fn handle_get_user(&self, req: GetUserRequest) -> Result<GetUserResponse, UsersError> {
        let user = self.find_user(QueryOption::IdEq(req.id)).await?;
        Ok(GetUserResponse {
            user: Some(User::from(&user)),
        })
    }

    async fn handle_get_me(&self, ctx: &CallContext) -> Result<GetMeResponse, Status> {
        let principal = ctx.require_principal()?;
        let user = self.find_user(QueryOption::IdEq(principal.user_id)).await?;
        Ok(GetMeResponse {
            user: Some(User::from(&user)),
        })
    }

    async fn handle_list_users(&self, req: ListUsersRequest) -> Result<ListUsersResponse, UsersError> {
        let page = req.page.max(1);
        let page_size = if req.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            req.page_size
        };
        let options = search_options(&req.search);

        let (users, total_count) = self.store.get_users(page, page_size, &options).await?;

        Ok(ListUsersResponse {
            users: users.iter().map(User::from).collect(),
            total_count,
        })
    }

    /// Create the admin account unless a user with that name already exists
    ///
    /// Returns whether an account was created.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<bool, UsersError> {
        let existing = self
            .store
            .get_user(&[QueryOption::UsernameEq(username.to_string())])
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
        match self
            .store
            .create_user(NewUser::new(username, password_hash).with_role(Role::Admin))
            .await
            .map_err(UsersError::from)
        {
            Ok(_) => Ok(true),
            // Another replica won the race
            Err(UsersError::UsernameAlreadyExists) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// `search` matches usernames fuzzily, or an exact id when it is numeric
fn search_options(search: &str) -> Vec<QueryOption> {
    let search = search.trim();
    if search.is_empty() {
        return Vec::new();
    }

    let mut alternatives = vec![QueryOption::UsernameFuzzy(search.to_string())];
    if let Ok(id) = search.parse::<i64>() {
        alternatives.push(QueryOption::IdEq(id));
    }
    vec![QueryOption::Or(alternatives)]
}

#[tonic::async_trait]
impl UsersService for UsersServiceImpl {
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<CreateUserResponse>, Status> {
        self.chain
            .run(routes::CREATE_USER, request, |_, req| async move {
                self.handle_create_user(req).await.map_err(Status::from)
            })
            .await
    }

    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<LoginResponse>, Status> {
        self.chain
            .run(routes::LOGIN, request, |_, req| async move {
                self.handle_login(req).await.map_err(Status::from)
            })
            .await
    }

    async fn get_user(
        &self,
        request: Request<GetUserRequest>,
    ) -> Result<Response<GetUserResponse>, Status> {
        self.chain
            .run(routes::GET_USER, request, |_, req| async move {
                self.handle_get_user(req).await.map_err(Status::from)
            })
            .await
    }

    async fn get_me(&self, request: Request<GetMeRequest>) -> Result<Response<GetMeResponse>, Status> {
        self.chain
            .run(routes::GET_ME, request, |ctx, _| async move {
                self.handle_get_me(&ctx).await
            })
            .await
    }

    async fn list_users(
        &self,
        request: Request<ListUsersRequest>,
    ) -> Result<Response<ListUsersResponse>, Status> {
        self.chain
            .run(routes::LIST_USERS, request, |_, req| async move {
                self.handle_list_users(req).await.map_err(Status::from)
            })
            .await
    }
}
