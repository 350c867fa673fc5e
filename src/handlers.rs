use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::verify_token,
    error::ApiError,
    models::{ClassRecord, ClassUpdate, FeedbackEntry, NewClass, NewFeedback, SignIn, SignUp, User},
};

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnrollmentRequest {
    #[serde(default)]
    pub email: String,
}

fn authorize(
    state: &AppState,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    query: &TokenQuery,
) -> Result<(), ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    verify_token(&state.settings, auth_header, query.token.as_deref())
}

#[utoipa::path(get, path = "/", tag = "index")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Gym Booking API",
        "endpoints": {
            "/classes": "List classes, create a class",
            "/classes/{id}": "Show, edit or delete a class",
            "/classes/{id}/enroll": "Enroll an email in a class",
            "/classes/{id}/unenroll": "Cancel an enrollment",
            "/feedback": "Read or leave feedback"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "health")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "health")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/classes",
    responses((status = 200, description = "Classes from the local view", body = [ClassRecord])),
    tag = "classes"
)]
pub async fn list_classes(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.classes.list_classes().await)
}

#[utoipa::path(
    get,
    path = "/classes/{id}",
    params(("id" = String, Path, description = "Class id")),
    responses(
        (status = 200, description = "The class", body = ClassRecord),
        (status = 404, description = "No such class")
    ),
    tag = "classes"
)]
pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .classes
        .get_class_by_id(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Class {id} not found")))
}

#[utoipa::path(
    post,
    path = "/classes/refresh",
    responses((status = 200, description = "Whether a background refresh was started")),
    tag = "classes"
)]
pub async fn refresh_classes(State(state): State<AppState>) -> impl IntoResponse {
    let started = state.classes.refresh_on_focus();
    Json(serde_json::json!({"started": started}))
}

#[utoipa::path(
    post,
    path = "/classes/{id}/enroll",
    params(("id" = String, Path, description = "Class id")),
    request_body = EnrollmentRequest,
    responses(
        (status = 200, description = "Updated class", body = ClassRecord),
        (status = 400, description = "Missing email"),
        (status = 404, description = "No such class"),
        (status = 409, description = "Class is full")
    ),
    tag = "enrollment"
)]
pub async fn enroll(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let class = state.classes.enroll(&id, &request.email).await?;
    Ok(Json(class))
}

#[utoipa::path(
    post,
    path = "/classes/{id}/unenroll",
    params(("id" = String, Path, description = "Class id")),
    request_body = EnrollmentRequest,
    responses(
        (status = 200, description = "Updated class", body = ClassRecord),
        (status = 404, description = "No such class")
    ),
    tag = "enrollment"
)]
pub async fn unenroll(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<EnrollmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let class = state.classes.unenroll(&id, &request.email).await?;
    Ok(Json(class))
}

#[utoipa::path(
    post,
    path = "/classes",
    params(("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")),
    request_body = NewClass,
    responses(
        (status = 201, description = "Created class", body = ClassRecord),
        (status = 400, description = "Missing required field"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "classes"
)]
pub async fn create_class(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TokenQuery>,
    Json(new): Json<NewClass>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, &query)?;
    let class = state.classes.create_class(new).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

#[utoipa::path(
    put,
    path = "/classes/{id}",
    params(
        ("id" = String, Path, description = "Class id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    request_body = ClassUpdate,
    responses(
        (status = 200, description = "Updated class", body = ClassRecord),
        (status = 400, description = "Missing required field"),
        (status = 401, description = "Invalid authentication token"),
        (status = 404, description = "No such class")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "classes"
)]
pub async fn update_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TokenQuery>,
    Json(update): Json<ClassUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, &query)?;
    let class = state.classes.update_class(&id, update).await?;
    Ok(Json(class))
}

#[utoipa::path(
    delete,
    path = "/classes/{id}",
    params(
        ("id" = String, Path, description = "Class id"),
        ("token" = Option<String>, Query, description = "Authentication token (alternative to Bearer header)")
    ),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "classes"
)]
pub async fn delete_class(
    State(state): State<AppState>,
    Path(id): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, auth, &query)?;
    state.classes.delete_class(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/feedback",
    responses((status = 200, description = "Feedback, newest first", body = [FeedbackEntry])),
    tag = "feedback"
)]
pub async fn list_feedback(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.feedback.list_feedback().await)
}

#[utoipa::path(
    post,
    path = "/feedback",
    request_body = NewFeedback,
    responses(
        (status = 201, description = "Recorded feedback", body = FeedbackEntry),
        (status = 400, description = "Invalid rating or missing field")
    ),
    tag = "feedback"
)]
pub async fn add_feedback(
    State(state): State<AppState>,
    Json(new): Json<NewFeedback>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state.feedback.add_feedback(new).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    post,
    path = "/users/signup",
    request_body = SignUp,
    responses(
        (status = 201, description = "Registered user", body = User),
        (status = 409, description = "Email already registered")
    ),
    tag = "users"
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUp>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.sign_up(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/users/login",
    request_body = SignIn,
    responses(
        (status = 200, description = "Known user", body = User),
        (status = 404, description = "Unknown user")
    ),
    tag = "users"
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignIn>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.users.sign_in(request).await?;
    Ok(Json(user))
}
