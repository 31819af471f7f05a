//! HTTP/JSON handlers
//!
//! Each handler builds the same tonic request a gRPC client would send
//! (headers become metadata) and calls the shared service implementation, so
//! HTTP traffic passes through the identical interceptor chain.

use super::error::ApiError;
use super::GatewayState;
use crate::grpc::users::users_service_server::UsersService;
use crate::grpc::users::{
    CreateUserRequest, CreateUserResponse, GetMeRequest, GetMeResponse, GetUserRequest,
    GetUserResponse, ListUsersRequest, ListUsersResponse, LoginRequest, LoginResponse,
};
use crate::middleware::attach_cancellation;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use tonic::metadata::MetadataMap;
use tonic::{Extensions, Request};
use tracing::debug;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Translate an HTTP call into a tonic request
fn grpc_request<T>(state: &GatewayState, headers: HeaderMap, message: T) -> Request<T> {
    let mut request = Request::from_parts(MetadataMap::from_headers(headers), Extensions::new(), message);
    attach_cancellation(&mut request, state.shutdown.child_token());
    request
}

fn decoded<T>(input: Result<T, impl std::fmt::Display>) -> Result<T, ApiError> {
    input.map_err(|rejection| {
        debug!(error = %rejection, "Rejected undecodable HTTP request");
        ApiError::invalid_request()
    })
}

pub async fn create_user(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<CreateUserResponse> {
    let Json(message) = decoded(body)?;
    let response = state
        .service
        .create_user(grpc_request(&state, headers, message))
        .await?;
    Ok(Json(response.into_inner()))
}

pub async fn login(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(message) = decoded(body)?;
    let response = state
        .service
        .login(grpc_request(&state, headers, message))
        .await?;
    Ok(Json(response.into_inner()))
}

pub async fn get_user(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<GetUserResponse> {
    let Path(id) = decoded(id)?;
    let response = state
        .service
        .get_user(grpc_request(&state, headers, GetUserRequest { id }))
        .await?;
    Ok(Json(response.into_inner()))
}

pub async fn get_me(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> ApiResult<GetMeResponse> {
    let response = state
        .service
        .get_me(grpc_request(&state, headers, GetMeRequest {}))
        .await?;
    Ok(Json(response.into_inner()))
}

pub async fn list_users(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    query: Result<Query<ListUsersRequest>, QueryRejection>,
) -> ApiResult<ListUsersResponse> {
    let Query(message) = decoded(query)?;
    let response = state
        .service
        .list_users(grpc_request(&state, headers, message))
        .await?;
    Ok(Json(response.into_inner()))
}
