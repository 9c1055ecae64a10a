use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A newsfeed post. `target_group_id == None` means facility-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub target_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostComment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A photo album, group-scoped like a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GalleryItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub target_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GalleryImage {
    pub id: i64,
    pub gallery_item_id: i64,
    /// Blob store path; the store owns deletion of the underlying file.
    pub path: String,
}

impl GalleryImage {
    pub fn to_dto(&self) -> shared::GalleryImageDto {
        shared::GalleryImageDto {
            id: self.id,
            path: self.path.clone(),
        }
    }
}

/// An extracurricular activity offered to one or more groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SpecialActivity {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub schedule: String,
}

/// One day's menu; unique per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyMenu {
    pub id: i64,
    pub date: NaiveDate,
    pub breakfast: String,
    pub lunch: String,
    pub snack: String,
}

impl DailyMenu {
    pub fn to_dto(&self) -> shared::DailyMenuDto {
        shared::DailyMenuDto {
            id: self.id,
            date: self.date.to_string(),
            breakfast: self.breakfast.clone(),
            lunch: self.lunch.clone(),
            snack: self.snack.clone(),
        }
    }
}
