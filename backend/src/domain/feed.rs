//! Group-scoped content: the newsfeed, the photo gallery, special
//! activities and daily menus.
//!
//! Reads are filtered by the caller's content scope; writes are director
//! actions, except comments and likes which any visible reader may add.

use std::collections::HashMap;

use log::info;

use crate::domain::models::{DailyMenu, Post, SpecialActivity, User};
use crate::domain::visibility::{self, ContentScope};
use crate::error::{AppError, AppResult};
use crate::storage::{ChildRepository, ContentRepository, UserRepository};

#[derive(Clone)]
pub struct FeedService {
    content: ContentRepository,
    children: ChildRepository,
    users: UserRepository,
}

impl FeedService {
    pub fn new(
        content: ContentRepository,
        children: ChildRepository,
        users: UserRepository,
    ) -> Self {
        Self {
            content,
            children,
            users,
        }
    }

    async fn scope_for(&self, actor: &User) -> AppResult<ContentScope> {
        let groups = self.children.group_ids_of_parent(actor.id).await?;
        Ok(visibility::content_scope(actor, groups))
    }

    async fn group_scope_for(&self, actor: &User) -> AppResult<ContentScope> {
        let groups = self.children.group_ids_of_parent(actor.id).await?;
        Ok(visibility::group_only_scope(actor, groups))
    }

    async fn author_names(&self) -> AppResult<HashMap<i64, String>> {
        Ok(self
            .users
            .list()
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name()))
            .collect())
    }

    async fn ensure_group_exists(&self, target_group_id: Option<i64>) -> AppResult<()> {
        if let Some(group_id) = target_group_id {
            if self.children.find_group(group_id).await?.is_none() {
                return Err(AppError::not_found("group"));
            }
        }
        Ok(())
    }

    // --- posts ---

    pub async fn list_posts(&self, actor: &User) -> AppResult<Vec<shared::PostDto>> {
        let scope = self.scope_for(actor).await?;
        let posts = self.content.list_posts(&scope).await?;
        let names = self.author_names().await?;

        let mut out = Vec::with_capacity(posts.len());
        for post in posts {
            out.push(self.post_dto(actor, post, &names).await?);
        }
        Ok(out)
    }

    async fn post_dto(
        &self,
        actor: &User,
        post: Post,
        names: &HashMap<i64, String>,
    ) -> AppResult<shared::PostDto> {
        let (liked_by_me, likes_count) = self.content.post_like_state(post.id, actor.id).await?;
        let mut comments = Vec::new();
        for comment in self.content.comments_of_post(post.id).await? {
            let (liked, likes) = self
                .content
                .comment_like_state(comment.id, actor.id)
                .await?;
            comments.push(shared::PostCommentDto {
                id: comment.id,
                author_id: comment.author_id,
                author_name: names.get(&comment.author_id).cloned().unwrap_or_default(),
                content: comment.content,
                created_at: comment.created_at.to_rfc3339(),
                likes_count: likes as u32,
                liked_by_me: liked,
            });
        }
        Ok(shared::PostDto {
            id: post.id,
            title: post.title,
            content: post.content,
            image: post.image,
            target_group_id: post.target_group_id,
            created_at: post.created_at.to_rfc3339(),
            likes_count: likes_count as u32,
            liked_by_me,
            comments,
        })
    }

    pub async fn create_post(
        &self,
        actor: &User,
        req: shared::CreatePostRequest,
    ) -> AppResult<shared::PostDto> {
        visibility::ensure_director(actor)?;
        if req.title.trim().is_empty() {
            return Err(AppError::validation("title", "title is required"));
        }
        self.ensure_group_exists(req.target_group_id).await?;
        let post = self
            .content
            .create_post(
                &req.title,
                &req.content,
                req.image.as_deref(),
                req.target_group_id,
            )
            .await?;
        info!("post {} published", post.id);
        let names = self.author_names().await?;
        self.post_dto(actor, post, &names).await
    }

    pub async fn update_post(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpdatePostRequest,
    ) -> AppResult<shared::PostDto> {
        visibility::ensure_director(actor)?;
        let mut post = self
            .content
            .find_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("post"))?;

        if let Some(title) = req.title {
            if title.trim().is_empty() {
                return Err(AppError::validation("title", "title is required"));
            }
            post.title = title;
        }
        if let Some(content) = req.content {
            post.content = content;
        }
        if let Some(image) = req.image {
            post.image = Some(image);
        }
        if req.target_group_id.is_some() {
            self.ensure_group_exists(req.target_group_id).await?;
            post.target_group_id = req.target_group_id;
        }
        self.content.update_post(&post).await?;

        let names = self.author_names().await?;
        self.post_dto(actor, post, &names).await
    }

    /// Delete a post, returning its image blob path if it had one so the
    /// HTTP layer can clean up the file.
    pub async fn delete_post(&self, actor: &User, id: i64) -> AppResult<Option<String>> {
        visibility::ensure_director(actor)?;
        let post = self
            .content
            .find_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("post"))?;
        self.content.delete_post(post.id).await?;
        Ok(post.image)
    }

    /// Fetch a post the caller is allowed to see, or pretend it does not
    /// exist.
    async fn visible_post(&self, actor: &User, id: i64) -> AppResult<Post> {
        let post = self
            .content
            .find_post(id)
            .await?
            .ok_or_else(|| AppError::not_found("post"))?;
        let scope = self.scope_for(actor).await?;
        if !visibility::content_visible(&scope, post.target_group_id) {
            return Err(AppError::not_found("post"));
        }
        Ok(post)
    }

    pub async fn comment(
        &self,
        actor: &User,
        post_id: i64,
        req: shared::CommentRequest,
    ) -> AppResult<shared::PostCommentDto> {
        if req.content.trim().is_empty() {
            return Err(AppError::validation("content", "comment text is required"));
        }
        let post = self.visible_post(actor, post_id).await?;
        let comment = self
            .content
            .create_comment(post.id, actor.id, &req.content)
            .await?;
        Ok(shared::PostCommentDto {
            id: comment.id,
            author_id: actor.id,
            author_name: actor.display_name(),
            content: comment.content,
            created_at: comment.created_at.to_rfc3339(),
            likes_count: 0,
            liked_by_me: false,
        })
    }

    pub async fn toggle_post_like(
        &self,
        actor: &User,
        post_id: i64,
    ) -> AppResult<shared::LikeResponse> {
        let post = self.visible_post(actor, post_id).await?;
        let (liked, count) = self.content.toggle_post_like(post.id, actor.id).await?;
        Ok(shared::LikeResponse {
            liked,
            likes_count: count as u32,
        })
    }

    pub async fn toggle_comment_like(
        &self,
        actor: &User,
        comment_id: i64,
    ) -> AppResult<shared::LikeResponse> {
        let comment = self
            .content
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("comment"))?;
        self.visible_post(actor, comment.post_id).await?;
        let (liked, count) = self
            .content
            .toggle_comment_like(comment.id, actor.id)
            .await?;
        Ok(shared::LikeResponse {
            liked,
            likes_count: count as u32,
        })
    }

    // --- gallery ---

    pub async fn list_gallery(&self, actor: &User) -> AppResult<Vec<shared::GalleryItemDto>> {
        let scope = self.scope_for(actor).await?;
        let items = self.content.list_gallery_items(&scope).await?;
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.gallery_dto(actor, item.id).await?);
        }
        Ok(out)
    }

    async fn gallery_dto(&self, actor: &User, id: i64) -> AppResult<shared::GalleryItemDto> {
        let item = self.content.get_gallery_item(id).await?;
        let images = self
            .content
            .images_of_gallery_item(item.id)
            .await?
            .iter()
            .map(|i| i.to_dto())
            .collect();
        let (liked_by_me, likes_count) =
            self.content.gallery_like_state(item.id, actor.id).await?;
        Ok(shared::GalleryItemDto {
            id: item.id,
            title: item.title,
            description: item.description,
            target_group_id: item.target_group_id,
            created_at: item.created_at.to_rfc3339(),
            images,
            likes_count: likes_count as u32,
            liked_by_me,
        })
    }

    pub async fn create_gallery_item(
        &self,
        actor: &User,
        req: shared::CreateGalleryItemRequest,
    ) -> AppResult<shared::GalleryItemDto> {
        visibility::ensure_director(actor)?;
        if req.title.trim().is_empty() {
            return Err(AppError::validation("title", "title is required"));
        }
        self.ensure_group_exists(req.target_group_id).await?;
        let item = self
            .content
            .create_gallery_item(
                &req.title,
                req.description.as_deref().unwrap_or(""),
                req.target_group_id,
            )
            .await?;
        for path in &req.images {
            self.content.add_gallery_image(item.id, path).await?;
        }
        self.gallery_dto(actor, item.id).await
    }

    /// Update album fields and reconcile its image set. Returns the removed
    /// blob paths so the HTTP layer can delete the files.
    pub async fn update_gallery_item(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpdateGalleryItemRequest,
    ) -> AppResult<(shared::GalleryItemDto, Vec<String>)> {
        visibility::ensure_director(actor)?;
        let mut item = self
            .content
            .find_gallery_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("gallery item"))?;

        if let Some(title) = req.title {
            item.title = title;
        }
        if let Some(description) = req.description {
            item.description = description;
        }
        if req.target_group_id.is_some() {
            self.ensure_group_exists(req.target_group_id).await?;
            item.target_group_id = req.target_group_id;
        }
        self.content.update_gallery_item(&item).await?;

        for path in &req.new_images {
            self.content.add_gallery_image(item.id, path).await?;
        }
        let removed = self
            .content
            .delete_gallery_images(item.id, &req.deleted_image_ids)
            .await?;

        Ok((self.gallery_dto(actor, item.id).await?, removed))
    }

    pub async fn delete_gallery_item(&self, actor: &User, id: i64) -> AppResult<Vec<String>> {
        visibility::ensure_director(actor)?;
        let image_ids: Vec<i64> = self
            .content
            .images_of_gallery_item(id)
            .await?
            .iter()
            .map(|i| i.id)
            .collect();
        let removed = self.content.delete_gallery_images(id, &image_ids).await?;
        if !self.content.delete_gallery_item(id).await? {
            return Err(AppError::not_found("gallery item"));
        }
        Ok(removed)
    }

    pub async fn toggle_gallery_like(
        &self,
        actor: &User,
        id: i64,
    ) -> AppResult<shared::LikeResponse> {
        let item = self
            .content
            .find_gallery_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("gallery item"))?;
        let scope = self.scope_for(actor).await?;
        if !visibility::content_visible(&scope, item.target_group_id) {
            return Err(AppError::not_found("gallery item"));
        }
        let (liked, count) = self.content.toggle_gallery_like(item.id, actor.id).await?;
        Ok(shared::LikeResponse {
            liked,
            likes_count: count as u32,
        })
    }

    // --- special activities ---

    pub async fn list_activities(&self, actor: &User) -> AppResult<Vec<shared::SpecialActivityDto>> {
        let activities = match self.group_scope_for(actor).await? {
            ContentScope::All => self.content.list_activities().await?,
            ContentScope::GroupsOnly(ids) => {
                self.content.list_activities_for_groups(&ids).await?
            }
            // Activities are always group-targeted; other scopes are
            // unreachable from group_only_scope.
            _ => Vec::new(),
        };
        let mut out = Vec::with_capacity(activities.len());
        for activity in activities {
            out.push(self.activity_dto(activity).await?);
        }
        Ok(out)
    }

    async fn activity_dto(
        &self,
        activity: SpecialActivity,
    ) -> AppResult<shared::SpecialActivityDto> {
        let group_ids = self.content.groups_of_activity(activity.id).await?;
        Ok(shared::SpecialActivityDto {
            id: activity.id,
            name: activity.name,
            description: activity.description,
            schedule: activity.schedule,
            group_ids,
        })
    }

    pub async fn create_activity(
        &self,
        actor: &User,
        req: shared::UpsertSpecialActivityRequest,
    ) -> AppResult<shared::SpecialActivityDto> {
        visibility::ensure_director(actor)?;
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name", "activity name is required"));
        }
        for group_id in &req.group_ids {
            self.ensure_group_exists(Some(*group_id)).await?;
        }
        let activity = self
            .content
            .create_activity(&req.name, &req.description, &req.schedule, &req.group_ids)
            .await?;
        self.activity_dto(activity).await
    }

    pub async fn update_activity(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpsertSpecialActivityRequest,
    ) -> AppResult<shared::SpecialActivityDto> {
        visibility::ensure_director(actor)?;
        let mut activity = self
            .content
            .find_activity(id)
            .await?
            .ok_or_else(|| AppError::not_found("activity"))?;
        activity.name = req.name;
        activity.description = req.description;
        activity.schedule = req.schedule;
        self.content.update_activity(&activity, &req.group_ids).await?;
        self.activity_dto(activity).await
    }

    pub async fn delete_activity(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.content.delete_activity(id).await? {
            return Err(AppError::not_found("activity"));
        }
        Ok(())
    }

    // --- daily menus ---

    /// Menus are facility-wide; every authenticated user sees them.
    pub async fn list_menus(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> AppResult<Vec<DailyMenu>> {
        let start = start
            .map(|raw| super::children::parse_date("start", raw))
            .transpose()?;
        let end = end
            .map(|raw| super::children::parse_date("end", raw))
            .transpose()?;
        Ok(self.content.list_menus(start, end).await?)
    }

    pub async fn upsert_menu(
        &self,
        actor: &User,
        req: shared::UpsertDailyMenuRequest,
    ) -> AppResult<DailyMenu> {
        visibility::ensure_director(actor)?;
        let date = super::children::parse_date("date", &req.date)?;
        Ok(self
            .content
            .upsert_menu(date, &req.breakfast, &req.lunch, &req.snack)
            .await?)
    }

    pub async fn delete_menu(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.content.delete_menu(id).await? {
            return Err(AppError::not_found("menu"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::domain::models::Role;
    use chrono::NaiveDate;

    struct Fixture {
        service: FeedService,
        director: User,
        /// Parent with a child in group `bees`.
        bee_parent: User,
        /// Parent with no linked children.
        lone_parent: User,
        bees: i64,
        ants: i64,
    }

    async fn setup_test() -> Fixture {
        let db = DbConnection::init_test().await.unwrap();
        let pool = db.pool().clone();
        let users = UserRepository::new(pool.clone());
        let director = users
            .create("boss", Role::Director, "M", "D", "", None, "x")
            .await
            .unwrap();
        let bee_parent = users
            .create("p00001m", Role::Parent, "J", "K", "", None, "x")
            .await
            .unwrap();
        let lone_parent = users
            .create("p00002m", Role::Parent, "A", "N", "", None, "x")
            .await
            .unwrap();

        let children = ChildRepository::new(pool.clone());
        let bees = children.create_group("Bees", "").await.unwrap();
        let ants = children.create_group("Ants", "").await.unwrap();
        let child = children
            .create_child(
                "Zofia",
                "Kowalska",
                NaiveDate::from_ymd_opt(2020, 4, 12).unwrap(),
                bees.id,
                18.5,
                "",
            )
            .await
            .unwrap();
        children.link_parent(child.id, bee_parent.id).await.unwrap();

        let service = FeedService::new(ContentRepository::new(pool.clone()), children, users);
        Fixture {
            service,
            director,
            bee_parent,
            lone_parent,
            bees: bees.id,
            ants: ants.id,
        }
    }

    fn post(title: &str, target_group_id: Option<i64>) -> shared::CreatePostRequest {
        shared::CreatePostRequest {
            title: title.to_string(),
            content: "text".to_string(),
            image: None,
            target_group_id,
        }
    }

    #[tokio::test]
    async fn test_post_visibility_by_group() {
        let f = setup_test().await;
        f.service.create_post(&f.director, post("everyone", None)).await.unwrap();
        f.service
            .create_post(&f.director, post("bees only", Some(f.bees)))
            .await
            .unwrap();
        f.service
            .create_post(&f.director, post("ants only", Some(f.ants)))
            .await
            .unwrap();

        let titles = |posts: Vec<shared::PostDto>| {
            posts.into_iter().map(|p| p.title).collect::<Vec<_>>()
        };

        assert_eq!(titles(f.service.list_posts(&f.director).await.unwrap()).len(), 3);

        let bee_view = titles(f.service.list_posts(&f.bee_parent).await.unwrap());
        assert!(bee_view.contains(&"everyone".to_string()));
        assert!(bee_view.contains(&"bees only".to_string()));
        assert!(!bee_view.contains(&"ants only".to_string()));

        // No children linked: only global posts.
        let lone_view = titles(f.service.list_posts(&f.lone_parent).await.unwrap());
        assert_eq!(lone_view, vec!["everyone".to_string()]);
    }

    #[tokio::test]
    async fn test_like_toggles_and_invisible_post_is_not_found() {
        let f = setup_test().await;
        let visible = f
            .service
            .create_post(&f.director, post("everyone", None))
            .await
            .unwrap();
        let hidden = f
            .service
            .create_post(&f.director, post("ants only", Some(f.ants)))
            .await
            .unwrap();

        let like = f
            .service
            .toggle_post_like(&f.bee_parent, visible.id)
            .await
            .unwrap();
        assert!(like.liked);
        assert_eq!(like.likes_count, 1);

        let unlike = f
            .service
            .toggle_post_like(&f.bee_parent, visible.id)
            .await
            .unwrap();
        assert!(!unlike.liked);
        assert_eq!(unlike.likes_count, 0);

        let err = f
            .service
            .toggle_post_like(&f.bee_parent, hidden.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_comment_requires_content_and_visibility() {
        let f = setup_test().await;
        let p = f
            .service
            .create_post(&f.director, post("everyone", None))
            .await
            .unwrap();

        let err = f
            .service
            .comment(
                &f.bee_parent,
                p.id,
                shared::CommentRequest {
                    content: "   ".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let comment = f
            .service
            .comment(
                &f.bee_parent,
                p.id,
                shared::CommentRequest {
                    content: "lovely".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(comment.content, "lovely");

        let posts = f.service.list_posts(&f.director).await.unwrap();
        assert_eq!(posts[0].comments.len(), 1);
    }

    #[tokio::test]
    async fn test_director_can_edit_and_retarget_post() {
        let f = setup_test().await;
        let created = f
            .service
            .create_post(&f.director, post("draft", None))
            .await
            .unwrap();

        let err = f
            .service
            .update_post(
                &f.bee_parent,
                created.id,
                shared::UpdatePostRequest {
                    title: Some("hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let updated = f
            .service
            .update_post(
                &f.director,
                created.id,
                shared::UpdatePostRequest {
                    title: Some("bee news".to_string()),
                    target_group_id: Some(f.ants),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "bee news");
        assert_eq!(updated.target_group_id, Some(f.ants));
        // Untouched fields survive the partial update.
        assert_eq!(updated.content, "text");

        // Retargeted to the ants group, so the bee parent no longer sees it.
        assert!(f.service.list_posts(&f.bee_parent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_post_surfaces_image_path() {
        let f = setup_test().await;
        let with_image = f
            .service
            .create_post(
                &f.director,
                shared::CreatePostRequest {
                    image: Some("posts/trip.jpg".to_string()),
                    ..post("trip", None)
                },
            )
            .await
            .unwrap();
        let plain = f
            .service
            .create_post(&f.director, post("plain", None))
            .await
            .unwrap();

        let removed = f.service.delete_post(&f.director, with_image.id).await.unwrap();
        assert_eq!(removed.as_deref(), Some("posts/trip.jpg"));
        assert!(f.service.delete_post(&f.director, plain.id).await.unwrap().is_none());

        let err = f.service.delete_post(&f.director, plain.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_activities_have_no_global_fallback() {
        let f = setup_test().await;
        f.service
            .create_activity(
                &f.director,
                shared::UpsertSpecialActivityRequest {
                    name: "Chess".to_string(),
                    description: String::new(),
                    schedule: "Mondays".to_string(),
                    group_ids: vec![f.ants],
                },
            )
            .await
            .unwrap();

        assert_eq!(f.service.list_activities(&f.director).await.unwrap().len(), 1);
        assert!(f.service.list_activities(&f.bee_parent).await.unwrap().is_empty());
        assert!(f.service.list_activities(&f.lone_parent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_menu_upsert_replaces_same_date() {
        let f = setup_test().await;
        let req = shared::UpsertDailyMenuRequest {
            date: "2025-03-10".to_string(),
            breakfast: "porridge".to_string(),
            lunch: "soup".to_string(),
            snack: "apple".to_string(),
        };
        f.service.upsert_menu(&f.director, req.clone()).await.unwrap();
        f.service
            .upsert_menu(
                &f.director,
                shared::UpsertDailyMenuRequest {
                    lunch: "pierogi".to_string(),
                    ..req
                },
            )
            .await
            .unwrap();

        let menus = f.service.list_menus(None, None).await.unwrap();
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].lunch, "pierogi");

        // Menus are visible to parents regardless of groups.
        assert_eq!(f.service.list_menus(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gallery_update_reconciles_images() {
        let f = setup_test().await;
        let item = f
            .service
            .create_gallery_item(
                &f.director,
                shared::CreateGalleryItemRequest {
                    title: "Trip".to_string(),
                    description: None,
                    target_group_id: None,
                    images: vec!["a.jpg".to_string(), "b.jpg".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(item.images.len(), 2);

        let keep = item.images[1].id;
        let (updated, removed) = f
            .service
            .update_gallery_item(
                &f.director,
                item.id,
                shared::UpdateGalleryItemRequest {
                    new_images: vec!["c.jpg".to_string()],
                    deleted_image_ids: vec![item.images[0].id],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(removed, vec!["a.jpg".to_string()]);
        let paths: Vec<_> = updated.images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["b.jpg", "c.jpg"]);
        assert!(updated.images.iter().any(|i| i.id == keep));
    }
}
