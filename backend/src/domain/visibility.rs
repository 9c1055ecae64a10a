//! Role-scoped visibility.
//!
//! Every protected entity funnels through the same decision procedure: given
//! the requesting user (and, for group-scoped content, the groups of their
//! children), produce the scope a repository query must honor. Directors see
//! everything; parents see their own children's records plus facility-wide
//! content. Write gating (who may mutate which fields) also lives here so the
//! rules are not re-derived per endpoint.

use crate::domain::models::{Child, Role, User};
use crate::error::{AppError, AppResult};

/// Scope over child-owned rows (children, attendance, payments, templates).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordScope {
    /// Director: every row.
    All,
    /// Parent: rows whose child is linked to this account.
    OwnChildren(i64),
}

/// Scope over group-targeted content (posts, gallery, activities).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentScope {
    All,
    /// Facility-wide rows only (a parent with no linked children).
    GlobalOnly,
    /// Facility-wide rows plus rows targeting any of these groups.
    GroupsAndGlobal(Vec<i64>),
    /// Rows targeting any of these groups; nothing global exists for this
    /// entity (special activities).
    GroupsOnly(Vec<i64>),
}

pub fn record_scope(user: &User) -> RecordScope {
    match user.role {
        Role::Director => RecordScope::All,
        Role::Parent => RecordScope::OwnChildren(user.id),
    }
}

/// Scope for content where a NULL target group means "everyone".
pub fn content_scope(user: &User, parent_group_ids: Vec<i64>) -> ContentScope {
    match user.role {
        Role::Director => ContentScope::All,
        Role::Parent if parent_group_ids.is_empty() => ContentScope::GlobalOnly,
        Role::Parent => ContentScope::GroupsAndGlobal(parent_group_ids),
    }
}

/// Scope for content that is only ever group-targeted.
pub fn group_only_scope(user: &User, parent_group_ids: Vec<i64>) -> ContentScope {
    match user.role {
        Role::Director => ContentScope::All,
        Role::Parent => ContentScope::GroupsOnly(parent_group_ids),
    }
}

/// Is a single content row inside the requester's scope? Used for detail
/// fetches and like/comment actions so they match the list queries.
pub fn content_visible(scope: &ContentScope, target_group_id: Option<i64>) -> bool {
    match scope {
        ContentScope::All => true,
        ContentScope::GlobalOnly => target_group_id.is_none(),
        ContentScope::GroupsAndGlobal(ids) => match target_group_id {
            None => true,
            Some(id) => ids.contains(&id),
        },
        ContentScope::GroupsOnly(ids) => {
            matches!(target_group_id, Some(id) if ids.contains(&id))
        }
    }
}

/// Gate for director-only actions.
pub fn ensure_director(user: &User) -> AppResult<()> {
    if user.role.is_director() {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "only the director may perform this action".to_string(),
        ))
    }
}

/// Apply a child update with the caller's role deciding which fields stick.
/// A parent's submitted fields other than `medical_info` are discarded here,
/// server-side, never merely hidden by the client.
pub fn apply_child_update(role: Role, child: &mut Child, update: &shared::UpdateChildRequest) {
    if let Some(ref medical_info) = update.medical_info {
        child.medical_info = medical_info.clone();
    }
    if role.is_director() {
        if let Some(ref first_name) = update.first_name {
            child.first_name = first_name.clone();
        }
        if let Some(ref last_name) = update.last_name {
            child.last_name = last_name.clone();
        }
        if let Some(group_id) = update.group_id {
            child.group_id = group_id;
        }
        if let Some(meal_rate) = update.meal_rate {
            child.meal_rate = meal_rate;
        }
    }
}

/// Strip the paid state from a payment update unless the caller is a
/// director; parents can never flip `is_paid` no matter what they send.
pub fn sanitize_payment_update(
    role: Role,
    mut update: shared::UpdatePaymentRequest,
) -> shared::UpdatePaymentRequest {
    if !role.is_director() {
        update.is_paid = None;
        update.amount = None;
        update.description = None;
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            username: format!("u{id}"),
            role,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: String::new(),
            phone: None,
            avatar: None,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn child() -> Child {
        Child {
            id: 1,
            first_name: "Zofia".to_string(),
            last_name: "Kowalska".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(2020, 4, 12).unwrap(),
            group_id: 2,
            meal_rate: 18.5,
            medical_info: String::new(),
        }
    }

    #[test]
    fn test_record_scope_by_role() {
        assert_eq!(record_scope(&user(1, Role::Director)), RecordScope::All);
        assert_eq!(
            record_scope(&user(7, Role::Parent)),
            RecordScope::OwnChildren(7)
        );
    }

    #[test]
    fn test_content_scope_parent_without_children_sees_global_only() {
        let scope = content_scope(&user(7, Role::Parent), vec![]);
        assert_eq!(scope, ContentScope::GlobalOnly);
        assert!(content_visible(&scope, None));
        assert!(!content_visible(&scope, Some(3)));
    }

    #[test]
    fn test_content_scope_parent_with_groups() {
        let scope = content_scope(&user(7, Role::Parent), vec![2, 5]);
        assert!(content_visible(&scope, None));
        assert!(content_visible(&scope, Some(2)));
        assert!(content_visible(&scope, Some(5)));
        assert!(!content_visible(&scope, Some(9)));
    }

    #[test]
    fn test_group_only_scope_has_no_global_fallback() {
        let scope = group_only_scope(&user(7, Role::Parent), vec![2]);
        assert!(!content_visible(&scope, None));
        assert!(content_visible(&scope, Some(2)));
    }

    #[test]
    fn test_ensure_director_rejects_parent() {
        assert!(ensure_director(&user(1, Role::Director)).is_ok());
        let err = ensure_director(&user(2, Role::Parent)).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[test]
    fn test_parent_child_update_only_touches_medical_info() {
        let mut c = child();
        let update = shared::UpdateChildRequest {
            first_name: Some("hacked".to_string()),
            meal_rate: Some(999.0),
            medical_info: Some("peanut allergy".to_string()),
            ..Default::default()
        };
        apply_child_update(Role::Parent, &mut c, &update);
        assert_eq!(c.first_name, "Zofia");
        assert_eq!(c.meal_rate, 18.5);
        assert_eq!(c.medical_info, "peanut allergy");
    }

    #[test]
    fn test_director_child_update_applies_all_fields() {
        let mut c = child();
        let update = shared::UpdateChildRequest {
            first_name: Some("Hanna".to_string()),
            meal_rate: Some(21.0),
            group_id: Some(4),
            medical_info: Some("none".to_string()),
            ..Default::default()
        };
        apply_child_update(Role::Director, &mut c, &update);
        assert_eq!(c.first_name, "Hanna");
        assert_eq!(c.meal_rate, 21.0);
        assert_eq!(c.group_id, 4);
    }

    #[test]
    fn test_parent_payment_update_is_fully_stripped() {
        let update = shared::UpdatePaymentRequest {
            amount: Some(0.01),
            description: Some("nice try".to_string()),
            is_paid: Some(true),
        };
        let sanitized = sanitize_payment_update(Role::Parent, update);
        assert_eq!(sanitized, shared::UpdatePaymentRequest::default());
    }

    #[test]
    fn test_director_payment_update_kept() {
        let update = shared::UpdatePaymentRequest {
            amount: Some(120.0),
            description: None,
            is_paid: Some(true),
        };
        let sanitized = sanitize_payment_update(Role::Director, update.clone());
        assert_eq!(sanitized, update);
    }
}
