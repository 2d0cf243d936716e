use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::dto::{
    CategoryPageDto, CategoryTreeDto, ChatMessageDto, ThreadPageDto, UserDto,
};
use application::services::{
    AuthenticateUserRequest, CreateCategoryRequest, CreateReplyRequest, CreateThreadRequest,
    RegisterUserRequest,
};
use domain::{authorize, Capability, Role};

use crate::{
    auth::{CurrentActor, LoginResponse},
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateCategoryPayload {
    name: String,
    parent_id: Option<Uuid>,
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateThreadPayload {
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct CreateReplyPayload {
    title: Option<String>,
    body: String,
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatQuery {
    count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BannedNotice {
    message: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/banned", get(banned_notice))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/forum", get(forum_index))
        .route("/categories", post(create_category))
        .route("/categories/{id}", get(open_category))
        .route("/categories/{id}/overview", get(category_overview))
        .route("/categories/{id}/threads", post(create_thread))
        .route("/threads/{id}", get(open_thread))
        .route("/threads/{id}/posts", post(create_reply))
        .route("/chat", get(list_chat).post(post_chat))
        .route("/chat/{id}", put(edit_chat).delete(delete_chat))
        .route("/users/{id}/ban", put(ban_user).delete(unban_user))
        .route(
            "/users/{id}/roles/{role}",
            put(grant_role).delete(revoke_role),
        )
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn banned_notice() -> Json<BannedNotice> {
    Json(BannedNotice {
        message: "This account has been banned.",
    })
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserDto::from(&user))))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(user.id.into())?;
    Ok(Json(LoginResponse {
        user: UserDto::from(&user),
        token,
    }))
}

async fn forum_index(
    State(state): State<AppState>,
    actor: CurrentActor,
) -> Result<Json<Vec<CategoryTreeDto>>, ApiError> {
    let categories = state
        .category_service
        .list_top_categories(actor.as_actor())
        .await?;
    Ok(Json(categories))
}

async fn create_category(
    State(state): State<AppState>,
    actor: CurrentActor,
    payload: Result<Json<CreateCategoryPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<CategoryTreeDto>>), ApiError> {
    admit(&actor, Capability::ManageCategories)?;
    let Json(payload) = payload?;
    let categories = state
        .category_service
        .create_category(
            actor.as_actor(),
            CreateCategoryRequest {
                name: payload.name,
                parent_id: payload.parent_id,
                image_url: payload.image_url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(categories)))
}

async fn open_category(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryPageDto>, ApiError> {
    let page = state
        .category_service
        .open_category(actor.as_actor(), id)
        .await?;
    Ok(Json(page))
}

async fn category_overview(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryTreeDto>, ApiError> {
    let tree = state
        .category_service
        .open_top_category(actor.as_actor(), id)
        .await?;
    Ok(Json(tree))
}

async fn create_thread(
    State(state): State<AppState>,
    actor: CurrentActor,
    category_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateThreadPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ThreadPageDto>), ApiError> {
    admit(&actor, Capability::Participate)?;
    let Path(category_id) = category_id?;
    let Json(payload) = payload?;
    let page = state
        .thread_service
        .create_thread(
            actor.as_actor(),
            CreateThreadRequest {
                category_id,
                title: payload.title,
                body: payload.body,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn open_thread(
    State(state): State<AppState>,
    actor: CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ThreadPageDto>, ApiError> {
    let page = state.thread_service.open_thread(actor.as_actor(), id).await?;
    Ok(Json(page))
}

async fn create_reply(
    State(state): State<AppState>,
    actor: CurrentActor,
    thread_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateReplyPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ThreadPageDto>), ApiError> {
    admit(&actor, Capability::Participate)?;
    let Path(thread_id) = thread_id?;
    let Json(payload) = payload?;
    let page = state
        .thread_service
        .create_reply(
            actor.as_actor(),
            CreateReplyRequest {
                thread_id,
                title: payload.title,
                body: payload.body,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn list_chat(
    State(state): State<AppState>,
    actor: CurrentActor,
    query: Result<Query<ChatQuery>, QueryRejection>,
) -> Result<Json<Vec<ChatMessageDto>>, ApiError> {
    admit(&actor, Capability::Browse)?;
    let Query(query) = query?;
    let messages = state
        .chat_service
        .list_recent(actor.as_actor(), query.count)
        .await?;
    Ok(Json(messages))
}

async fn post_chat(
    State(state): State<AppState>,
    actor: CurrentActor,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatMessageDto>), ApiError> {
    admit(&actor, Capability::Participate)?;
    let Json(payload) = payload?;
    let message = state
        .chat_service
        .post_message(actor.as_actor(), payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn edit_chat(
    State(state): State<AppState>,
    actor: CurrentActor,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatMessageDto>, ApiError> {
    admit(&actor, Capability::ModerateChat)?;
    let Path(id) = id?;
    let Json(payload) = payload?;
    let message = state
        .chat_service
        .edit_message(actor.as_actor(), id, payload.text)
        .await?;
    Ok(Json(message))
}

async fn delete_chat(
    State(state): State<AppState>,
    actor: CurrentActor,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    admit(&actor, Capability::ModerateChat)?;
    let Path(id) = id?;
    state
        .chat_service
        .delete_message(actor.as_actor(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ban_user(
    State(state): State<AppState>,
    actor: CurrentActor,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserDto>, ApiError> {
    admit(&actor, Capability::ModerateUsers)?;
    let Path(id) = id?;
    let user = state.user_service.ban_user(actor.as_actor(), id).await?;
    Ok(Json(UserDto::from(&user)))
}

async fn unban_user(
    State(state): State<AppState>,
    actor: CurrentActor,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserDto>, ApiError> {
    admit(&actor, Capability::ModerateUsers)?;
    let Path(id) = id?;
    let user = state.user_service.unban_user(actor.as_actor(), id).await?;
    Ok(Json(UserDto::from(&user)))
}

async fn grant_role(
    State(state): State<AppState>,
    actor: CurrentActor,
    target: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<UserDto>, ApiError> {
    admit(&actor, Capability::ManageRoles)?;
    let Path((id, role)) = target?;
    let role = parse_role(&role)?;
    let user = state
        .user_service
        .grant_role(actor.as_actor(), id, role)
        .await?;
    Ok(Json(UserDto::from(&user)))
}

async fn revoke_role(
    State(state): State<AppState>,
    actor: CurrentActor,
    target: Result<Path<(Uuid, String)>, PathRejection>,
) -> Result<Json<UserDto>, ApiError> {
    admit(&actor, Capability::ManageRoles)?;
    let Path((id, role)) = target?;
    let role = parse_role(&role)?;
    let user = state
        .user_service
        .revoke_role(actor.as_actor(), id, role)
        .await?;
    Ok(Json(UserDto::from(&user)))
}

/// 在解析路径和请求体之前先做权限判断：匿名得 401，权限不足得 403。
fn admit(actor: &CurrentActor, capability: Capability) -> Result<(), ApiError> {
    authorize(actor.as_actor(), capability).map_err(ApiError::from)
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse::<Role>()
        .map_err(|_| ApiError::bad_request(format!("unknown role: {raw}")))
}
