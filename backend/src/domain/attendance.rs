//! Absence reporting and the facility closure calendar.

use chrono::{NaiveDateTime, Timelike};
use log::info;

use crate::domain::children::parse_date;
use crate::domain::models::{Attendance, FacilityClosure, User};
use crate::domain::visibility::{self, RecordScope};
use crate::error::{AppError, AppResult};
use crate::storage::{AttendanceRepository, ChildRepository};

#[derive(Clone)]
pub struct AttendanceService {
    attendance: AttendanceRepository,
    children: ChildRepository,
    /// Local hour after which parents can no longer report a same-day
    /// absence; the kitchen has already ordered by then.
    cutoff_hour: u32,
}

impl AttendanceService {
    pub fn new(
        attendance: AttendanceRepository,
        children: ChildRepository,
        cutoff_hour: u32,
    ) -> Self {
        Self {
            attendance,
            children,
            cutoff_hour,
        }
    }

    /// Report an absence. `now` is the caller's local wall clock; the cutoff
    /// and the past-date rule apply to parents only.
    pub async fn report_absence(
        &self,
        actor: &User,
        req: shared::ReportAbsenceRequest,
        now: NaiveDateTime,
    ) -> AppResult<Attendance> {
        let date = parse_date("date", &req.date)?;

        if let RecordScope::OwnChildren(user_id) = visibility::record_scope(actor) {
            if !self.children.is_parent_of(user_id, req.child_id).await? {
                return Err(AppError::not_found("child"));
            }
            let today = now.date();
            if date < today {
                return Err(AppError::validation(
                    "date",
                    "absences cannot be reported for past dates",
                ));
            }
            if date == today && now.hour() >= self.cutoff_hour {
                return Err(AppError::validation(
                    "date",
                    format!(
                        "same-day absences must be reported before {}:00",
                        self.cutoff_hour
                    ),
                ));
            }
        } else if self.children.find_child(req.child_id).await?.is_none() {
            return Err(AppError::not_found("child"));
        }

        let record = self
            .attendance
            .create(req.child_id, date)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict(format!(
                    "an absence for {date} is already reported for this child"
                )),
                other => other,
            })?;
        info!("absence reported for child {} on {date}", req.child_id);
        Ok(record)
    }

    pub async fn list(&self, actor: &User) -> AppResult<Vec<Attendance>> {
        match visibility::record_scope(actor) {
            RecordScope::All => Ok(self.attendance.list_all().await?),
            RecordScope::OwnChildren(user_id) => {
                Ok(self.attendance.list_for_parent(user_id).await?)
            }
        }
    }

    // --- closures ---

    pub async fn list_closures(&self) -> AppResult<Vec<FacilityClosure>> {
        Ok(self.attendance.list_closures().await?)
    }

    pub async fn create_closure(
        &self,
        actor: &User,
        req: shared::UpsertFacilityClosureRequest,
    ) -> AppResult<FacilityClosure> {
        visibility::ensure_director(actor)?;
        let date = parse_date("date", &req.date)?;
        self.attendance
            .create_closure(date, &req.label)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => {
                    AppError::Conflict(format!("{date} is already marked as closed"))
                }
                other => other,
            })
    }

    pub async fn delete_closure(&self, actor: &User, id: i64) -> AppResult<()> {
        visibility::ensure_director(actor)?;
        if !self.attendance.delete_closure(id).await? {
            return Err(AppError::not_found("closure"));
        }
        Ok(())
    }
}
