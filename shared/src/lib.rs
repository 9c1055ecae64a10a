//! DTO types exchanged between the nursery backend and its clients.
//!
//! Everything here is plain serde data: dates travel as ISO strings
//! (`YYYY-MM-DD`) and timestamps as RFC 3339. Domain invariants live in the
//! backend; these types only describe the wire shape.

use serde::{Deserialize, Serialize};

/// Role of an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Director,
    Parent,
}

/// A user account as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

/// Request to provision a new account. When `auto_generate` is set the
/// backend invents the username and password and returns them once in
/// [`ProvisionAccountResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionAccountRequest {
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub auto_generate: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionAccountResponse {
    pub user: UserDto,
    /// Present only for auto-generated accounts; shown to the director once.
    pub generated_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Set or clear the caller's avatar; the value is a blob-store path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAvatarRequest {
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// A classroom group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDto {
    pub id: i64,
    pub name: String,
    pub teachers_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertGroupRequest {
    pub name: String,
    pub teachers_info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDto {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub group_id: i64,
    /// Charged per billable day by the meal billing run.
    pub meal_rate: f64,
    pub medical_info: String,
    pub parent_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChildRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub group_id: i64,
    pub meal_rate: f64,
    pub medical_info: Option<String>,
}

/// Partial child update. Which fields actually apply depends on the caller's
/// role: parents may only change `medical_info`, everything else is dropped
/// server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateChildRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub group_id: Option<i64>,
    pub meal_rate: Option<f64>,
    pub medical_info: Option<String>,
}

/// A reported absence. The mere existence of a record means the child was
/// reported absent for that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDto {
    pub id: i64,
    pub child_id: i64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAbsenceRequest {
    pub child_id: i64,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDto {
    pub id: i64,
    pub child_id: i64,
    pub amount: f64,
    pub description: String,
    pub is_paid: bool,
    /// RFC 3339; present exactly when `is_paid` is true.
    pub payment_date: Option<String>,
    pub payment_title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub child_id: i64,
    pub amount: f64,
    pub description: String,
}

/// Partial payment update. `is_paid` is honored only for directors; a parent
/// submitting it has the field stripped before anything is persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePaymentRequest {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPaymentDto {
    pub id: i64,
    pub child_id: i64,
    pub amount: f64,
    pub description: String,
    pub frequency: Frequency,
    pub next_due: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertRecurringPaymentRequest {
    pub child_id: i64,
    pub amount: f64,
    pub description: String,
    pub frequency: Frequency,
    pub next_due: String,
    pub is_active: bool,
}

/// Outcome of one meal billing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealBillingReport {
    pub period: String,
    pub business_days: u32,
    pub payments_created: u32,
    /// Children skipped because the period was already billed for them.
    pub already_billed: u32,
    /// Children skipped because the computed amount was zero.
    pub zero_amount: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringBillingReport {
    pub payments_created: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityClosureDto {
    pub id: i64,
    pub date: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertFacilityClosureRequest {
    pub date: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub receiver_id: i64,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

/// Parents never pick a receiver: the backend routes the message to the
/// administration. Directors must name one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Option<i64>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkAllReadRequest {
    /// Director option: restrict to correspondence from this parent.
    pub counterpart_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub marked: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDto {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub target_group_id: Option<i64>,
    pub created_at: String,
    pub likes_count: u32,
    pub liked_by_me: bool,
    pub comments: Vec<PostCommentDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCommentDto {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: String,
    pub likes_count: u32,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub target_group_id: Option<i64>,
}

/// Edit a post; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub target_group_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Result of a like/unlike toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItemDto {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub target_group_id: Option<i64>,
    pub created_at: String,
    pub images: Vec<GalleryImageDto>,
    pub likes_count: u32,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImageDto {
    pub id: i64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGalleryItemRequest {
    pub title: String,
    pub description: Option<String>,
    pub target_group_id: Option<i64>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateGalleryItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_group_id: Option<i64>,
    pub new_images: Vec<String>,
    pub deleted_image_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialActivityDto {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub group_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertSpecialActivityRequest {
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub group_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMenuDto {
    pub id: i64,
    pub date: String,
    pub breakfast: String,
    pub lunch: String,
    pub snack: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpsertDailyMenuRequest {
    pub date: String,
    pub breakfast: String,
    pub lunch: String,
    pub snack: String,
}

/// Director dashboard numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorStats {
    pub unread_messages: u32,
    pub absent_today: u32,
    pub present_today: u32,
    pub total_children: u32,
}

/// Structured error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
