//! HTTP surface. Handlers stay thin: authenticate, hand the request to a
//! domain service, shape the response. Every failure path goes through
//! [`AppError`]'s `IntoResponse`.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::db::DbConnection;
use crate::domain::models::User;
use crate::domain::{
    AccountService, AttendanceService, BillingService, ChildService, FeedService,
    MessagingService, PaymentService,
};
use crate::error::{AppError, AppResult};
use crate::notify::Mailer;
use crate::presence::PresenceTracker;
use crate::storage::{
    AttendanceRepository, ChildRepository, ContentRepository, MessageRepository,
    PaymentRepository, UserRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub children: ChildService,
    pub attendance: AttendanceService,
    pub payments: PaymentService,
    pub billing: BillingService,
    pub messaging: MessagingService,
    pub feed: FeedService,
    pub presence: PresenceTracker,
    pub users: UserRepository,
}

impl AppState {
    pub fn new(db: &DbConnection, config: &Config, mailer: Mailer) -> Self {
        let pool = db.pool().clone();
        let users = UserRepository::new(pool.clone());
        let children_repo = ChildRepository::new(pool.clone());
        let attendance_repo = AttendanceRepository::new(pool.clone());
        let payments_repo = PaymentRepository::new(pool.clone());
        let messages_repo = MessageRepository::new(pool.clone());
        let content_repo = ContentRepository::new(pool);

        Self {
            accounts: AccountService::new(
                users.clone(),
                children_repo.clone(),
                attendance_repo.clone(),
                messages_repo.clone(),
                mailer.clone(),
            ),
            children: ChildService::new(children_repo.clone()),
            attendance: AttendanceService::new(
                attendance_repo.clone(),
                children_repo.clone(),
                config.attendance_cutoff_hour,
            ),
            payments: PaymentService::new(payments_repo.clone(), children_repo.clone()),
            billing: BillingService::new(payments_repo, children_repo.clone(), attendance_repo),
            messaging: MessagingService::new(messages_repo, users.clone(), mailer),
            feed: FeedService::new(content_repo, children_repo, users.clone()),
            presence: PresenceTracker::new(),
            users,
        }
    }
}

/// The authenticated caller, resolved from the `Authorization: Bearer` token.
/// Director requests also refresh the presence map as a side effect.
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| unauthorized("missing bearer token"))?;

        let user = state
            .accounts
            .authenticate(token)
            .await
            .map_err(IntoResponse::into_response)?
            .ok_or_else(|| unauthorized("invalid or expired token"))?;

        if user.role.is_director() {
            state.presence.mark_online(user.id);
        }
        Ok(CurrentUser(user))
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(shared::ErrorBody {
            error: message.to_string(),
            field: None,
        }),
    )
        .into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
        .route("/auth/request-password-reset", post(request_password_reset))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/avatar", put(update_avatar))
        .route("/users", get(list_users).post(provision_account))
        .route("/stats", get(director_stats))
        .route("/directors/online", get(directors_online))
        .route("/groups", get(list_groups).post(create_group))
        .route("/groups/:id", put(update_group).delete(delete_group))
        .route("/children", get(list_children).post(create_child))
        .route(
            "/children/:id",
            get(get_child).patch(update_child).delete(delete_child),
        )
        .route(
            "/children/:id/parents/:user_id",
            post(link_parent).delete(unlink_parent),
        )
        .route("/attendance", get(list_attendance).post(report_absence))
        .route("/closures", get(list_closures).post(create_closure))
        .route("/closures/:id", delete(delete_closure))
        .route("/payments", get(list_payments).post(create_payment))
        .route(
            "/payments/:id",
            get(get_payment).patch(update_payment).delete(delete_payment),
        )
        .route(
            "/recurring-payments",
            get(list_templates).post(create_template),
        )
        .route(
            "/recurring-payments/:id",
            put(update_template).delete(delete_template),
        )
        .route("/billing/meals/:year/:month", post(run_meal_billing))
        .route("/billing/recurring", post(run_recurring_billing))
        .route("/messages", get(list_messages).post(send_message))
        .route("/messages/unread", get(unread_messages))
        .route("/messages/read-all", post(mark_all_read))
        .route("/messages/:id/read", post(mark_message_read))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", patch(update_post).delete(delete_post))
        .route("/posts/:id/comments", post(comment_on_post))
        .route("/posts/:id/like", post(toggle_post_like))
        .route("/comments/:id/like", post(toggle_comment_like))
        .route("/gallery", get(list_gallery).post(create_gallery_item))
        .route(
            "/gallery/:id",
            patch(update_gallery_item).delete(delete_gallery_item),
        )
        .route("/gallery/:id/like", post(toggle_gallery_like))
        .route("/activities", get(list_activities).post(create_activity))
        .route(
            "/activities/:id",
            put(update_activity).delete(delete_activity),
        )
        .route("/menus", get(list_menus).post(upsert_menu))
        .route("/menus/:id", delete(delete_menu))
        .with_state(state)
}

// --- auth ---

async fn login(
    State(state): State<AppState>,
    Json(req): Json<shared::LoginRequest>,
) -> AppResult<Json<shared::LoginResponse>> {
    let (token, user) = state.accounts.login(&req.username, &req.password).await?;
    info!("login: {}", user.username);
    Ok(Json(shared::LoginResponse {
        token,
        user: user.to_dto(),
    }))
}

async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    headers: axum::http::HeaderMap,
) -> AppResult<StatusCode> {
    if let Some(token) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.accounts.logout(token).await?;
    }
    state.presence.clear(user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn me(CurrentUser(user): CurrentUser) -> Json<shared::UserDto> {
    Json(user.to_dto())
}

async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    state
        .accounts
        .change_password(&user, &req.old_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<shared::RequestPasswordResetRequest>,
) -> AppResult<StatusCode> {
    state.accounts.request_password_reset(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<shared::ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    state
        .accounts
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::UpdateAvatarRequest>,
) -> AppResult<Json<shared::UserDto>> {
    let previous = user.avatar.clone();
    state.users.update_avatar(user.id, req.avatar.as_deref()).await?;
    if let Some(old) = previous.filter(|p| Some(p.as_str()) != req.avatar.as_deref()) {
        info!("avatar replaced, blob {old} can be cleaned up");
    }
    let updated = state.users.get(user.id).await?;
    Ok(Json(updated.to_dto()))
}

// --- users, stats, presence ---

async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::UserDto>>> {
    let users = state.accounts.list_users(&user).await?;
    Ok(Json(users.iter().map(User::to_dto).collect()))
}

async fn provision_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::ProvisionAccountRequest>,
) -> AppResult<(StatusCode, Json<shared::ProvisionAccountResponse>)> {
    let (created, generated_password) = state.accounts.provision(&user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(shared::ProvisionAccountResponse {
            user: created.to_dto(),
            generated_password,
        }),
    ))
}

async fn director_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<shared::DirectorStats>> {
    let stats = state
        .accounts
        .director_stats(&user, Local::now().date_naive())
        .await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
struct OnlineResponse {
    online: bool,
}

async fn directors_online(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let ids = state.users.director_ids().await?;
    Ok(Json(OnlineResponse {
        online: state.presence.any_online(&ids),
    }))
}

// --- groups ---

async fn list_groups(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> AppResult<Json<Vec<shared::GroupDto>>> {
    let groups = state.children.list_groups().await?;
    Ok(Json(groups.iter().map(|g| g.to_dto()).collect()))
}

async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::UpsertGroupRequest>,
) -> AppResult<(StatusCode, Json<shared::GroupDto>)> {
    let group = state.children.create_group(&user, req).await?;
    Ok((StatusCode::CREATED, Json(group.to_dto())))
}

async fn update_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpsertGroupRequest>,
) -> AppResult<Json<shared::GroupDto>> {
    let group = state.children.update_group(&user, id, req).await?;
    Ok(Json(group.to_dto()))
}

async fn delete_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.children.delete_group(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- children ---

async fn child_dto(state: &AppState, child: crate::domain::models::Child) -> AppResult<shared::ChildDto> {
    let parent_ids = state.children.parent_ids_of_child(child.id).await?;
    Ok(child.to_dto(parent_ids))
}

async fn list_children(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::ChildDto>>> {
    let children = state.children.list_children(&user).await?;
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        out.push(child_dto(&state, child).await?);
    }
    Ok(Json(out))
}

async fn get_child(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<shared::ChildDto>> {
    let child = state.children.get_child(&user, id).await?;
    Ok(Json(child_dto(&state, child).await?))
}

async fn create_child(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::CreateChildRequest>,
) -> AppResult<(StatusCode, Json<shared::ChildDto>)> {
    let child = state.children.create_child(&user, req).await?;
    Ok((StatusCode::CREATED, Json(child_dto(&state, child).await?)))
}

async fn update_child(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpdateChildRequest>,
) -> AppResult<Json<shared::ChildDto>> {
    let child = state.children.update_child(&user, id, req).await?;
    Ok(Json(child_dto(&state, child).await?))
}

async fn delete_child(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.children.delete_child(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn link_parent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((child_id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let parent = state
        .users
        .find(user_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::not_found("user"))?;
    state.children.link_parent(&user, child_id, &parent).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unlink_parent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((child_id, user_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    state.children.unlink_parent(&user, child_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- attendance ---

async fn list_attendance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::AttendanceDto>>> {
    let records = state.attendance.list(&user).await?;
    Ok(Json(records.iter().map(|r| r.to_dto()).collect()))
}

async fn report_absence(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::ReportAbsenceRequest>,
) -> AppResult<(StatusCode, Json<shared::AttendanceDto>)> {
    let record = state
        .attendance
        .report_absence(&user, req, Local::now().naive_local())
        .await?;
    Ok((StatusCode::CREATED, Json(record.to_dto())))
}

async fn list_closures(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
) -> AppResult<Json<Vec<shared::FacilityClosureDto>>> {
    let closures = state.attendance.list_closures().await?;
    Ok(Json(closures.iter().map(|c| c.to_dto()).collect()))
}

async fn create_closure(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::UpsertFacilityClosureRequest>,
) -> AppResult<(StatusCode, Json<shared::FacilityClosureDto>)> {
    let closure = state.attendance.create_closure(&user, req).await?;
    Ok((StatusCode::CREATED, Json(closure.to_dto())))
}

async fn delete_closure(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.attendance.delete_closure(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- payments ---

async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::PaymentDto>>> {
    let payments = state.payments.list(&user).await?;
    Ok(Json(payments.iter().map(|p| p.to_dto()).collect()))
}

async fn get_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<shared::PaymentDto>> {
    let payment = state.payments.get(&user, id).await?;
    Ok(Json(payment.to_dto()))
}

async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<shared::PaymentDto>)> {
    let payment = state
        .payments
        .create(&user, req, Local::now().date_naive())
        .await?;
    Ok((StatusCode::CREATED, Json(payment.to_dto())))
}

async fn update_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpdatePaymentRequest>,
) -> AppResult<Json<shared::PaymentDto>> {
    let payment = state.payments.update(&user, id, req).await?;
    Ok(Json(payment.to_dto()))
}

async fn delete_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.payments.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_templates(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::RecurringPaymentDto>>> {
    let templates = state.payments.list_templates(&user).await?;
    Ok(Json(templates.iter().map(|t| t.to_dto()).collect()))
}

async fn create_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::UpsertRecurringPaymentRequest>,
) -> AppResult<(StatusCode, Json<shared::RecurringPaymentDto>)> {
    let template = state.payments.create_template(&user, req).await?;
    Ok((StatusCode::CREATED, Json(template.to_dto())))
}

async fn update_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpsertRecurringPaymentRequest>,
) -> AppResult<Json<shared::RecurringPaymentDto>> {
    let template = state.payments.update_template(&user, id, req).await?;
    Ok(Json(template.to_dto()))
}

async fn delete_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.payments.delete_template(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- billing runs ---

async fn run_meal_billing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((year, month)): Path<(i32, u32)>,
) -> AppResult<Json<shared::MealBillingReport>> {
    info!("meal billing run for {year}-{month:02} by {}", user.username);
    let report = state.billing.run_meal_billing(&user, year, month).await?;
    Ok(Json(report))
}

async fn run_recurring_billing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<shared::RecurringBillingReport>> {
    info!("recurring billing run by {}", user.username);
    let report = state
        .billing
        .run_recurring_billing(&user, Local::now().date_naive())
        .await?;
    Ok(Json(report))
}

// --- messages ---

async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::MessageDto>>> {
    Ok(Json(state.messaging.list(&user).await?))
}

async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::SendMessageRequest>,
) -> AppResult<(StatusCode, Json<shared::MessageDto>)> {
    let message = state.messaging.send(&user, req).await?;
    let dto = message.to_dto(user.display_name());
    Ok((StatusCode::CREATED, Json(dto)))
}

async fn unread_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<shared::UnreadCountResponse>> {
    let unread = state.messaging.unread_count(&user).await?;
    Ok(Json(shared::UnreadCountResponse { unread }))
}

async fn mark_message_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.messaging.mark_read(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::MarkAllReadRequest>,
) -> AppResult<Json<shared::MarkAllReadResponse>> {
    let marked = state.messaging.mark_all_read(&user, req).await?;
    Ok(Json(shared::MarkAllReadResponse { marked }))
}

// --- posts ---

async fn list_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::PostDto>>> {
    Ok(Json(state.feed.list_posts(&user).await?))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::CreatePostRequest>,
) -> AppResult<(StatusCode, Json<shared::PostDto>)> {
    let post = state.feed.create_post(&user, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpdatePostRequest>,
) -> AppResult<Json<shared::PostDto>> {
    Ok(Json(state.feed.update_post(&user, id, req).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if let Some(image) = state.feed.delete_post(&user, id).await? {
        info!("post {id}: image {image} can be cleaned up");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn comment_on_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::CommentRequest>,
) -> AppResult<(StatusCode, Json<shared::PostCommentDto>)> {
    let comment = state.feed.comment(&user, id, req).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn toggle_post_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<shared::LikeResponse>> {
    Ok(Json(state.feed.toggle_post_like(&user, id).await?))
}

async fn toggle_comment_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<shared::LikeResponse>> {
    Ok(Json(state.feed.toggle_comment_like(&user, id).await?))
}

// --- gallery ---

async fn list_gallery(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::GalleryItemDto>>> {
    Ok(Json(state.feed.list_gallery(&user).await?))
}

async fn create_gallery_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::CreateGalleryItemRequest>,
) -> AppResult<(StatusCode, Json<shared::GalleryItemDto>)> {
    let item = state.feed.create_gallery_item(&user, req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_gallery_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpdateGalleryItemRequest>,
) -> AppResult<Json<shared::GalleryItemDto>> {
    let (item, removed) = state.feed.update_gallery_item(&user, id, req).await?;
    if !removed.is_empty() {
        info!("gallery item {id}: {} image file(s) to clean up", removed.len());
    }
    Ok(Json(item))
}

async fn delete_gallery_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let removed = state.feed.delete_gallery_item(&user, id).await?;
    if !removed.is_empty() {
        info!("gallery item {id}: {} image file(s) to clean up", removed.len());
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_gallery_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<shared::LikeResponse>> {
    Ok(Json(state.feed.toggle_gallery_like(&user, id).await?))
}

// --- activities ---

async fn list_activities(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<shared::SpecialActivityDto>>> {
    Ok(Json(state.feed.list_activities(&user).await?))
}

async fn create_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::UpsertSpecialActivityRequest>,
) -> AppResult<(StatusCode, Json<shared::SpecialActivityDto>)> {
    let activity = state.feed.create_activity(&user, req).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn update_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<shared::UpsertSpecialActivityRequest>,
) -> AppResult<Json<shared::SpecialActivityDto>> {
    Ok(Json(state.feed.update_activity(&user, id, req).await?))
}

async fn delete_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.feed.delete_activity(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- menus ---

#[derive(Debug, Deserialize)]
struct MenuQuery {
    start: Option<String>,
    end: Option<String>,
}

async fn list_menus(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Query(query): Query<MenuQuery>,
) -> AppResult<Json<Vec<shared::DailyMenuDto>>> {
    let menus = state
        .feed
        .list_menus(query.start.as_deref(), query.end.as_deref())
        .await?;
    Ok(Json(menus.iter().map(|m| m.to_dto()).collect()))
}

async fn upsert_menu(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<shared::UpsertDailyMenuRequest>,
) -> AppResult<Json<shared::DailyMenuDto>> {
    let menu = state.feed.upsert_menu(&user, req).await?;
    Ok(Json(menu.to_dto()))
}

async fn delete_menu(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.feed.delete_menu(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Role;

    async fn setup_test() -> AppState {
        let db = DbConnection::init_test().await.unwrap();
        let config = Config {
            port: 0,
            database_url: String::new(),
            attendance_cutoff_hour: 9,
            smtp_server: None,
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            mail_from: "noreply@nursery.local".to_string(),
            reset_url_base: String::new(),
        };
        AppState::new(&db, &config, Mailer::disabled())
    }

    async fn provisioned_director(state: &AppState) -> (String, User) {
        let hash = crate::domain::accounts::hash_password("director-pass").unwrap();
        let user = state
            .users
            .create("boss", Role::Director, "M", "D", "", None, &hash)
            .await
            .unwrap();
        let (token, _) = state.accounts.login("boss", "director-pass").await.unwrap();
        (token, user)
    }

    #[tokio::test]
    async fn test_login_and_me_roundtrip() {
        let state = setup_test().await;
        let (token, user) = provisioned_director(&state).await;
        let authed = state.accounts.authenticate(&token).await.unwrap().unwrap();
        assert_eq!(authed.id, user.id);
    }

    #[tokio::test]
    async fn test_director_presence_marked_on_request() {
        let state = setup_test().await;
        let (_, user) = provisioned_director(&state).await;
        assert!(!state.presence.is_online(user.id));
        state.presence.mark_online(user.id);
        let ids = state.users.director_ids().await.unwrap();
        assert!(state.presence.any_online(&ids));
    }

    #[tokio::test]
    async fn test_router_builds() {
        let state = setup_test().await;
        let _app = router(state);
    }
}
