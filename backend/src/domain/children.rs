//! Groups, children and parent links.

use chrono::NaiveDate;
use log::info;

use crate::domain::models::{Child, Group, Role, User};
use crate::domain::visibility::{self, RecordScope};
use crate::error::{AppError, AppResult};
use crate::storage::ChildRepository;

const MAX_PARENTS_PER_CHILD: usize = 2;

#[derive(Clone)]
pub struct ChildService {
    children: ChildRepository,
}

impl ChildService {
    pub fn new(children: ChildRepository) -> Self {
        Self { children }
    }

    // --- groups ---

    pub async fn list_groups(&self) -> AppResult<Vec<Group>> {
        Ok(self.children.list_groups().await?)
    }

    pub async fn create_group(
        &self,
        actor: &User,
        req: shared::UpsertGroupRequest,
    ) -> AppResult<Group> {
        visibility::ensure_director(actor)?;
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name", "group name is required"));
        }
        Ok(self.children.create_group(&req.name, &req.teachers_info).await?)
    }

    pub async fn update_group(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpsertGroupRequest,
    ) -> AppResult<Group> {
        visibility::ensure_director(actor)?;
        let mut group = self
            .children
            .find_group(id)
            .await?
            .ok_or_else(|| AppError::not_found("group"))?;
        group.name = req.name;
        group.teachers_info = req.teachers_info;
        self.children.update_group(&group).await?;
        Ok(group)
    }

    /// Refuse deletion while any child still belongs to the group, with a
    /// clear message rather than a raw constraint error.
    pub async fn delete_group(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        let count = self.children.group_child_count(id).await?;
        if count > 0 {
            return Err(AppError::validation(
                "group_id",
                format!("group still has {count} enrolled children"),
            ));
        }
        if !self.children.delete_group(id).await? {
            return Err(AppError::not_found("group"));
        }
        Ok(())
    }

    // --- children ---

    pub async fn list_children(&self, actor: &User) -> AppResult<Vec<Child>> {
        match visibility::record_scope(actor) {
            RecordScope::All => Ok(self.children.list_children().await?),
            RecordScope::OwnChildren(user_id) => {
                Ok(self.children.children_of_parent(user_id).await?)
            }
        }
    }

    /// Fetch one child, enforcing that parents only reach their own.
    pub async fn get_child(&self, actor: &User, id: i64) -> AppResult<Child> {
        let child = self
            .children
            .find_child(id)
            .await?
            .ok_or_else(|| AppError::not_found("child"))?;
        self.ensure_can_see(actor, child.id).await?;
        Ok(child)
    }

    pub async fn create_child(
        &self,
        actor: &User,
        req: shared::CreateChildRequest,
    ) -> AppResult<Child> {
        visibility::ensure_director(actor)?;
        let date_of_birth = parse_date("date_of_birth", &req.date_of_birth)?;
        if req.meal_rate < 0.0 {
            return Err(AppError::validation(
                "meal_rate",
                "meal rate cannot be negative",
            ));
        }
        if self.children.find_group(req.group_id).await?.is_none() {
            return Err(AppError::not_found("group"));
        }
        let child = self
            .children
            .create_child(
                &req.first_name,
                &req.last_name,
                date_of_birth,
                req.group_id,
                req.meal_rate,
                req.medical_info.as_deref().unwrap_or(""),
            )
            .await?;
        info!("enrolled child {} {}", child.first_name, child.last_name);
        Ok(child)
    }

    /// Partial update; the caller's role decides which fields apply.
    pub async fn update_child(
        &self,
        actor: &User,
        id: i64,
        req: shared::UpdateChildRequest,
    ) -> AppResult<Child> {
        let mut child = self.get_child(actor, id).await?;

        if actor.role.is_director() {
            if let Some(ref raw) = req.date_of_birth {
                child.date_of_birth = parse_date("date_of_birth", raw)?;
            }
            if let Some(group_id) = req.group_id {
                if self.children.find_group(group_id).await?.is_none() {
                    return Err(AppError::not_found("group"));
                }
            }
        }
        visibility::apply_child_update(actor.role, &mut child, &req);
        self.children.update_child(&child).await?;
        Ok(child)
    }

    pub async fn delete_child(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.children.delete_child(id).await? {
            return Err(AppError::not_found("child"));
        }
        Ok(())
    }

    // --- parent links ---

    pub async fn link_parent(&self, actor: &User, child_id: i64, parent: &User) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if parent.role != Role::Parent {
            return Err(AppError::validation(
                "user_id",
                "only parent accounts can be linked to a child",
            ));
        }
        let existing = self.children.parent_ids_of_child(child_id).await?;
        if existing.contains(&parent.id) {
            return Ok(());
        }
        if existing.len() >= MAX_PARENTS_PER_CHILD {
            return Err(AppError::validation(
                "user_id",
                format!("a child can have at most {MAX_PARENTS_PER_CHILD} linked parents"),
            ));
        }
        self.children.link_parent(child_id, parent.id).await?;
        Ok(())
    }

    pub async fn unlink_parent(&self, actor: &User, child_id: i64, user_id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.children.unlink_parent(child_id, user_id).await? {
            return Err(AppError::not_found("parent link"));
        }
        Ok(())
    }

    pub async fn parent_ids_of_child(&self, child_id: i64) -> AppResult<Vec<i64>> {
        Ok(self.children.parent_ids_of_child(child_id).await?)
    }

    /// Guard shared by every child-keyed service: directors pass, parents
    /// must be linked to the child.
    pub async fn ensure_can_see(&self, actor: &User, child_id: i64) -> AppResult<()> {
        match visibility::record_scope(actor) {
            RecordScope::All => Ok(()),
            RecordScope::OwnChildren(user_id) => {
                if self.children.is_parent_of(user_id, child_id).await? {
                    Ok(())
                } else {
                    Err(AppError::not_found("child"))
                }
            }
        }
    }
}

pub fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    raw.parse()
        .map_err(|_| AppError::validation(field, format!("{raw:?} is not a valid date")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::storage::UserRepository;

    async fn setup_test() -> (DbConnection, ChildService, User, User) {
        let db = DbConnection::init_test().await.unwrap();
        let pool = db.pool().clone();
        let users = UserRepository::new(pool.clone());
        let director = users
            .create("boss", Role::Director, "Maria", "D", "", None, "x")
            .await
            .unwrap();
        let parent = users
            .create("p00001m", Role::Parent, "Jan", "K", "", None, "x")
            .await
            .unwrap();
        let service = ChildService::new(ChildRepository::new(pool));
        (db, service, director, parent)
    }

    fn child_request(group_id: i64) -> shared::CreateChildRequest {
        shared::CreateChildRequest {
            first_name: "Zofia".to_string(),
            last_name: "Kowalska".to_string(),
            date_of_birth: "2020-04-12".to_string(),
            group_id,
            meal_rate: 18.5,
            medical_info: None,
        }
    }

    #[tokio::test]
    async fn test_group_delete_refused_while_occupied() {
        let (_db, service, director, _) = setup_test().await;
        let group = service
            .create_group(
                &director,
                shared::UpsertGroupRequest {
                    name: "Bees".to_string(),
                    teachers_info: String::new(),
                },
            )
            .await
            .unwrap();
        let child = service
            .create_child(&director, child_request(group.id))
            .await
            .unwrap();

        let err = service.delete_group(&director, group.id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "group_id"));

        service.delete_child(&director, child.id).await.unwrap();
        service.delete_group(&director, group.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_parent_sees_only_linked_children() {
        let (_db, service, director, parent) = setup_test().await;
        let group = service
            .create_group(
                &director,
                shared::UpsertGroupRequest {
                    name: "Bees".to_string(),
                    teachers_info: String::new(),
                },
            )
            .await
            .unwrap();
        let mine = service
            .create_child(&director, child_request(group.id))
            .await
            .unwrap();
        let other = service
            .create_child(&director, child_request(group.id))
            .await
            .unwrap();
        service.link_parent(&director, mine.id, &parent).await.unwrap();

        let listed = service.list_children(&parent).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        // The other child is invisible, not merely forbidden.
        let err = service.get_child(&parent, other.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(service.list_children(&director).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_at_most_two_parents_per_child() {
        let (db, service, director, parent) = setup_test().await;
        let users = UserRepository::new(db.pool().clone());
        let second = users
            .create("p00002m", Role::Parent, "Anna", "K", "", None, "x")
            .await
            .unwrap();
        let third = users
            .create("p00003m", Role::Parent, "Ewa", "N", "", None, "x")
            .await
            .unwrap();

        let group = service
            .create_group(
                &director,
                shared::UpsertGroupRequest {
                    name: "Bees".to_string(),
                    teachers_info: String::new(),
                },
            )
            .await
            .unwrap();
        let child = service
            .create_child(&director, child_request(group.id))
            .await
            .unwrap();

        service.link_parent(&director, child.id, &parent).await.unwrap();
        service.link_parent(&director, child.id, &second).await.unwrap();
        // Relinking an existing parent is a no-op, not a third slot.
        service.link_parent(&director, child.id, &parent).await.unwrap();

        let err = service
            .link_parent(&director, child.id, &third)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_parent_update_limited_to_medical_info() {
        let (_db, service, director, parent) = setup_test().await;
        let group = service
            .create_group(
                &director,
                shared::UpsertGroupRequest {
                    name: "Bees".to_string(),
                    teachers_info: String::new(),
                },
            )
            .await
            .unwrap();
        let child = service
            .create_child(&director, child_request(group.id))
            .await
            .unwrap();
        service.link_parent(&director, child.id, &parent).await.unwrap();

        let updated = service
            .update_child(
                &parent,
                child.id,
                shared::UpdateChildRequest {
                    first_name: Some("hacked".to_string()),
                    meal_rate: Some(0.0),
                    medical_info: Some("lactose intolerant".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Zofia");
        assert_eq!(updated.meal_rate, 18.5);
        assert_eq!(updated.medical_info, "lactose intolerant");
    }
}
