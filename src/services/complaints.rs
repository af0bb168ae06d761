//! Complaint lifecycle: ownership-scoped CRUD, admin triage and the archive sweep

use crate::db::Stores;
use crate::error::AppError;
use crate::models::*;
use crate::services::notifications::{Notification, Notifier};
use crate::validation::{
    validate_content_changes, validate_note, validate_triage, ComplaintSubmission,
};
use chrono::{Duration, SecondsFormat, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// How many activities the dashboard shows
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

const REPORT_HEADER: &str = "Title,User,Department,Priority,Status,Assigned To,Created At";

/// Result of a mutation plus the notification tasks it started
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<JoinHandle<()>>,
}

impl<T> Outcome<T> {
    /// Drop the handles. The tasks keep running on their own.
    pub fn detach(self) -> T {
        self.value
    }
}

#[derive(Clone)]
pub struct ComplaintService {
    stores: Stores,
    notifier: Notifier,
}

impl ComplaintService {
    pub fn new(stores: Stores, notifier: Notifier) -> Self {
        Self { stores, notifier }
    }

    pub async fn create(
        &self,
        submission: ComplaintSubmission,
        requester: &Identity,
    ) -> Result<Outcome<ComplaintView>, AppError> {
        let owner = self
            .stores
            .users
            .find_by_id(requester.id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let complaint = self
            .stores
            .complaints
            .insert(NewComplaint {
                title: submission.title,
                description: submission.description,
                department: submission.department,
                priority: submission.priority,
                owner_id: owner.id,
            })
            .await?;

        tracing::info!("Complaint {} submitted by {}", complaint.id, owner.username);
        self.record_activity(format!(
            "New complaint \"{}\" was submitted by {}.",
            complaint.title, owner.username
        ))
        .await;

        let notifications = vec![
            self.notifier
                .dispatch(Notification::complaint_submitted(&complaint, &owner.email)),
            self.notifier
                .dispatch(Notification::new_complaint_for_admin(&complaint)),
        ];

        Ok(Outcome {
            value: self.present_one(complaint, requester).await?,
            notifications,
        })
    }

    /// Owners see their own complaints, admins see everyone's. Archived ones are left out.
    pub async fn list(&self, requester: &Identity) -> Result<Vec<ComplaintView>, AppError> {
        let query = if requester.is_admin() {
            ComplaintQuery::active()
        } else {
            ComplaintQuery::owned_by(requester.id)
        };
        let complaints = self.stores.complaints.list(query).await?;
        self.present(complaints, requester).await
    }

    pub async fn get(&self, id: Uuid, requester: &Identity) -> Result<ComplaintView, AppError> {
        let complaint = self.find(id).await?;
        if !complaint.is_owned_by(requester) && !requester.is_admin() {
            return Err(AppError::forbidden("You do not have access to this complaint"));
        }
        self.present_one(complaint, requester).await
    }

    /// Load a complaint the requester owns
    async fn ensure_owned(&self, id: Uuid, requester: &Identity) -> Result<Complaint, AppError> {
        let complaint = self.find(id).await?;
        if !complaint.is_owned_by(requester) {
            return Err(AppError::forbidden("You can only modify your own complaints"));
        }
        Ok(complaint)
    }

    /// Load a complaint the requester may edit. Archived ones are read-only.
    ///
    /// Runs before any payload checks so a stranger always gets Forbidden.
    pub async fn ensure_editable(&self, id: Uuid, requester: &Identity) -> Result<Complaint, AppError> {
        let complaint = self.ensure_owned(id, requester).await?;
        if complaint.archived {
            return Err(AppError::forbidden("Archived complaints cannot be modified"));
        }
        Ok(complaint)
    }

    /// Owner edit of title, description, department and priority. Status is left alone.
    pub async fn update_content(
        &self,
        id: Uuid,
        request: &ComplaintRequest,
        requester: &Identity,
    ) -> Result<Outcome<ComplaintView>, AppError> {
        let mut complaint = self.ensure_editable(id, requester).await?;
        let changes = validate_content_changes(request)?;

        if let Some(title) = changes.title {
            complaint.title = title;
        }
        if let Some(description) = changes.description {
            complaint.description = description;
        }
        if let Some(department) = changes.department {
            complaint.department = department;
        }
        if let Some(priority) = changes.priority {
            complaint.priority = priority;
        }

        let saved = self.save(&complaint).await?;
        tracing::info!("Complaint {} edited by owner {}", saved.id, requester.username);

        let notifications = vec![
            self.notifier.dispatch(Notification::complaint_updated(&saved)),
            self.notifier.dispatch(Notification::complaint_updated_for_admin(
                &saved,
                &requester.username,
            )),
        ];

        Ok(Outcome {
            value: self.present_one(saved, requester).await?,
            notifications,
        })
    }

    /// Admin edit of status, priority, assignee and public response, with an optional note.
    ///
    /// A status change notifies the owner and a new assignee is notified too.
    /// Both fire independently when both change.
    pub async fn triage(
        &self,
        id: Uuid,
        request: &TriageRequest,
        admin: &Identity,
    ) -> Result<Outcome<ComplaintView>, AppError> {
        require_admin(admin)?;
        let mut complaint = self.find(id).await?;
        let changes = validate_triage(request)?;

        let mut status_changed = false;
        if let Some(status) = changes.status {
            status_changed = status != complaint.status;
            complaint.status = status;
        }
        if let Some(priority) = changes.priority {
            complaint.priority = priority;
        }
        let mut newly_assigned = None;
        if let Some(assignee) = changes.assigned_to {
            if assignee != complaint.assigned_to {
                newly_assigned = assignee;
            }
            complaint.assigned_to = assignee;
        }
        if let Some(response) = changes.public_response {
            complaint.public_response = Some(response);
        }

        let mut saved = self.save(&complaint).await?;
        if let Some(text) = changes.note {
            saved = self.append(id, text, admin).await?;
        }

        tracing::info!(
            "Complaint {} updated by admin {} (status: {})",
            saved.id,
            admin.username,
            saved.status
        );
        self.record_activity(format!("Complaint \"{}\" was updated.", saved.title))
            .await;

        let mut notifications = Vec::new();
        if status_changed {
            notifications.push(self.notifier.dispatch(Notification::complaint_updated(&saved)));
        }
        if let Some(assignee) = newly_assigned {
            notifications.push(
                self.notifier
                    .dispatch(Notification::complaint_assigned(&saved, assignee)),
            );
        }

        Ok(Outcome {
            value: self.present_one(saved, admin).await?,
            notifications,
        })
    }

    pub async fn add_note(
        &self,
        id: Uuid,
        note: &str,
        admin: &Identity,
    ) -> Result<ComplaintView, AppError> {
        require_admin(admin)?;
        let text = validate_note(note)?;
        let complaint = self.append(id, text, admin).await?;
        tracing::info!("Note added to complaint {} by {}", id, admin.username);
        self.present_one(complaint, admin).await
    }

    /// Permanent removal, owner only. Archived complaints can still be removed.
    pub async fn delete(&self, id: Uuid, requester: &Identity) -> Result<(), AppError> {
        self.ensure_owned(id, requester).await?;
        if !self.stores.complaints.delete(id).await? {
            return Err(AppError::not_found("Complaint not found"));
        }
        tracing::info!("Complaint {} deleted by owner {}", id, requester.username);
        Ok(())
    }

    /// Flag every complaint created more than `older_than` ago as archived.
    /// Already archived complaints are not counted again.
    pub async fn archive_sweep(&self, older_than: Duration) -> Result<u64, AppError> {
        let cutoff = Utc::now() - older_than;
        let archived = self.stores.complaints.archive_created_before(cutoff).await?;
        if archived > 0 {
            tracing::info!("Archived {} complaints created before {}", archived, cutoff);
        }
        Ok(archived)
    }

    pub async fn stats(&self) -> Result<ComplaintStats, AppError> {
        let complaints = self
            .stores
            .complaints
            .list(ComplaintQuery::everything())
            .await?;
        Ok(compute_stats(&complaints))
    }

    /// CSV export of every complaint
    pub async fn report(&self) -> Result<String, AppError> {
        let complaints = self
            .stores
            .complaints
            .list(ComplaintQuery::everything())
            .await?;
        let users = self.users_for(&complaints).await?;

        let mut csv = String::from(REPORT_HEADER);
        csv.push('\n');
        for c in &complaints {
            let owner = users
                .get(&c.owner_id)
                .map(|u| u.username.as_str())
                .unwrap_or("N/A");
            let assignee = c
                .assigned_to
                .and_then(|id| users.get(&id))
                .map(|u| u.username.as_str())
                .unwrap_or("Unassigned");
            let created_at = c.created_at.to_rfc3339_opts(SecondsFormat::Millis, true);
            let row = [
                c.title.as_str(),
                owner,
                c.department.as_str(),
                c.priority.as_str(),
                c.status.as_str(),
                assignee,
                created_at.as_str(),
            ];
            let fields: Vec<String> = row.into_iter().map(csv_field).collect();
            csv.push_str(&fields.join(","));
            csv.push('\n');
        }
        Ok(csv)
    }

    pub async fn recent_activities(&self) -> Result<Vec<Activity>, AppError> {
        Ok(self.stores.activities.recent(RECENT_ACTIVITY_LIMIT).await?)
    }

    async fn find(&self, id: Uuid) -> Result<Complaint, AppError> {
        self.stores
            .complaints
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found("Complaint not found"))
    }

    async fn save(&self, complaint: &Complaint) -> Result<Complaint, AppError> {
        self.stores
            .complaints
            .save(complaint)
            .await?
            .ok_or_else(|| AppError::not_found("Complaint not found"))
    }

    async fn append(&self, id: Uuid, text: String, author: &Identity) -> Result<Complaint, AppError> {
        let note = InternalNote {
            text,
            author_id: author.id,
            created_at: Utc::now(),
        };
        self.stores
            .complaints
            .append_note(id, note)
            .await?
            .ok_or_else(|| AppError::not_found("Complaint not found"))
    }

    /// The activity log is informational; a failed write never fails the request.
    async fn record_activity(&self, description: String) {
        if let Err(e) = self.stores.activities.record(&description).await {
            tracing::warn!("Failed to record activity '{}': {}", description, e);
        }
    }

    async fn users_for(&self, complaints: &[Complaint]) -> Result<HashMap<Uuid, User>, AppError> {
        let mut ids: Vec<Uuid> = complaints
            .iter()
            .flat_map(|c| std::iter::once(c.owner_id).chain(c.assigned_to))
            .collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.stores.users.find_many(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    async fn present(
        &self,
        complaints: Vec<Complaint>,
        viewer: &Identity,
    ) -> Result<Vec<ComplaintView>, AppError> {
        let users = self.users_for(&complaints).await?;
        Ok(complaints
            .into_iter()
            .map(|c| view(c, &users, viewer.is_admin()))
            .collect())
    }

    async fn present_one(
        &self,
        complaint: Complaint,
        viewer: &Identity,
    ) -> Result<ComplaintView, AppError> {
        let users = self.users_for(std::slice::from_ref(&complaint)).await?;
        Ok(view(complaint, &users, viewer.is_admin()))
    }
}

fn require_admin(identity: &Identity) -> Result<(), AppError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::forbidden("Admin access required"))
    }
}

fn view(complaint: Complaint, users: &HashMap<Uuid, User>, with_notes: bool) -> ComplaintView {
    ComplaintView {
        id: complaint.id,
        owner: users.get(&complaint.owner_id).map(UserSummary::from),
        assigned_to: complaint
            .assigned_to
            .and_then(|id| users.get(&id))
            .map(UserSummary::from),
        owner_id: complaint.owner_id,
        assigned_to_id: complaint.assigned_to,
        title: complaint.title,
        description: complaint.description,
        department: complaint.department,
        priority: complaint.priority,
        status: complaint.status,
        public_response: complaint.public_response,
        archived: complaint.archived,
        created_at: complaint.created_at,
        updated_at: complaint.updated_at,
        internal_notes: with_notes.then_some(complaint.internal_notes),
    }
}

fn compute_stats(complaints: &[Complaint]) -> ComplaintStats {
    let mut by_department: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_status: BTreeMap<ComplaintStatus, usize> = BTreeMap::new();
    let mut resolved_by_day: BTreeMap<String, usize> = BTreeMap::new();

    for c in complaints {
        *by_department.entry(c.department.as_str()).or_default() += 1;
        *by_status.entry(c.status).or_default() += 1;
        if c.status == ComplaintStatus::Resolved {
            *resolved_by_day
                .entry(c.created_at.format("%Y-%m-%d").to_string())
                .or_default() += 1;
        }
    }

    ComplaintStats {
        total_complaints: complaints.len(),
        pending_complaints: complaints.iter().filter(|c| c.status.is_pending()).count(),
        resolved_complaints: by_status
            .get(&ComplaintStatus::Resolved)
            .copied()
            .unwrap_or(0),
        high_priority_complaints: complaints
            .iter()
            .filter(|c| c.priority == Priority::High)
            .count(),
        complaints_by_category: by_department
            .into_iter()
            .map(|(key, count)| GroupCount {
                key: key.to_string(),
                count,
            })
            .collect(),
        complaints_by_status: by_status
            .into_iter()
            .map(|(status, count)| GroupCount {
                key: status.as_str().to_string(),
                count,
            })
            .collect(),
        resolution_trends: resolved_by_day
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect(),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, UserStore};
    use crate::services::notifications::testing::{FailingMailer, RecordingMailer};
    use crate::services::notifications::Mailer;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    struct Fixture {
        service: ComplaintService,
        store: Arc<MemoryStore>,
        alice: Identity,
        bob: Identity,
        admin: Identity,
    }

    async fn add_user(store: &MemoryStore, username: &str, role: Role) -> Identity {
        UserStore::create(
            store,
            NewUser {
                username: username.to_string(),
                email: format!("{}@x.com", username),
                password_hash: "hash".to_string(),
                role,
            },
        )
        .await
        .unwrap()
        .identity()
    }

    async fn fixture(mailer: Arc<dyn Mailer>) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let alice = add_user(&store, "alice", Role::User).await;
        let bob = add_user(&store, "bob", Role::User).await;
        let admin = add_user(&store, "root", Role::Admin).await;
        let stores = Stores::from_shared(store.clone());
        let notifier = Notifier::new(mailer, stores.users.clone(), None);
        Fixture {
            service: ComplaintService::new(stores, notifier),
            store,
            alice,
            bob,
            admin,
        }
    }

    fn leak() -> ComplaintSubmission {
        ComplaintSubmission {
            title: "Leak".to_string(),
            description: "pipe".to_string(),
            department: "Maintenance".to_string(),
            priority: Priority::High,
        }
    }

    async fn settle(handles: Vec<JoinHandle<()>>) {
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_sets_owner_and_status_and_notifies() {
        let mailer = Arc::new(RecordingMailer::default());
        let f = fixture(mailer.clone()).await;

        let outcome = f.service.create(leak(), &f.alice).await.unwrap();
        let created = outcome.value;
        settle(outcome.notifications).await;

        assert_eq!(created.status, ComplaintStatus::New);
        assert_eq!(created.owner_id, f.alice.id);
        assert_eq!(created.owner.unwrap().username, "alice");
        assert!(created.internal_notes.is_none());

        // No admin address configured, so only the owner confirmation goes out.
        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@x.com");
        assert_eq!(sent[0].subject, "Complaint Submitted Successfully");

        let activities = f.service.recent_activities().await.unwrap();
        assert_eq!(
            activities[0].description,
            "New complaint \"Leak\" was submitted by alice."
        );
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_owner_for_users() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap().detach();

        let for_bob = f.service.list(&f.bob).await.unwrap();
        assert!(for_bob.iter().all(|c| c.id != created.id));

        let for_alice = f.service.list(&f.alice).await.unwrap();
        assert_eq!(for_alice.len(), 1);

        let for_admin = f.service.list(&f.admin).await.unwrap();
        assert!(for_admin.iter().any(|c| c.id == created.id));
        assert!(for_admin[0].internal_notes.is_some());
    }

    #[tokio::test]
    async fn test_get_requires_owner_or_admin() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap().detach();

        assert_ok!(f.service.get(created.id, &f.alice).await);
        assert_ok!(f.service.get(created.id, &f.admin).await);
        let err = assert_err!(f.service.get(created.id, &f.bob).await);
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = assert_err!(f.service.get(Uuid::new_v4(), &f.alice).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_non_owner_is_forbidden_regardless_of_payload() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap().detach();

        let garbage = ComplaintRequest {
            title: Some(String::new()),
            priority: Some("Urgent".to_string()),
            ..Default::default()
        };
        let err = assert_err!(f.service.update_content(created.id, &garbage, &f.bob).await);
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = assert_err!(f.service.delete(created.id, &f.bob).await);
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_ok!(f.service.get(created.id, &f.alice).await);

        // Triage is admin-only.
        let err = assert_err!(
            f.service
                .triage(created.id, &TriageRequest::default(), &f.alice)
                .await
        );
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_owner_edit_keeps_status() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap().detach();
        let triage = TriageRequest {
            status: Some("In Progress".to_string()),
            ..Default::default()
        };
        f.service.triage(created.id, &triage, &f.admin).await.unwrap();

        let edit = ComplaintRequest {
            description: Some("pipe under the sink".to_string()),
            ..Default::default()
        };
        let updated = f
            .service
            .update_content(created.id, &edit, &f.alice)
            .await
            .unwrap()
            .detach();
        assert_eq!(updated.description, "pipe under the sink");
        assert_eq!(updated.title, "Leak");
        assert_eq!(updated.status, ComplaintStatus::InProgress);
    }

    #[tokio::test]
    async fn test_owner_delete_removes_record() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap().detach();

        assert_ok!(f.service.delete(created.id, &f.alice).await);
        let err = assert_err!(f.service.get(created.id, &f.admin).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_and_assignee_change_notify_both() {
        let mailer = Arc::new(RecordingMailer::default());
        let f = fixture(mailer.clone()).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap();
        settle(created.notifications).await;

        let triage = TriageRequest {
            status: Some("Resolved".to_string()),
            assigned_to: Some(Some(f.bob.id)),
            note: Some("called plumber".to_string()),
            ..Default::default()
        };
        let outcome = f
            .service
            .triage(created.value.id, &triage, &f.admin)
            .await
            .unwrap();
        settle(outcome.notifications).await;

        let updated = outcome.value;
        assert_eq!(updated.status, ComplaintStatus::Resolved);
        assert_eq!(updated.owner_id, f.alice.id);
        assert_eq!(updated.assigned_to.unwrap().username, "bob");
        let notes = updated.internal_notes.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].author_id, f.admin.id);

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 3);
        assert!(sent
            .iter()
            .any(|m| m.to == "alice@x.com" && m.subject == "Complaint Updated"));
        assert!(sent
            .iter()
            .any(|m| m.to == "bob@x.com" && m.subject == "New Complaint Assigned to You"));
    }

    #[tokio::test]
    async fn test_unknown_assignee_is_kept_and_notification_skipped() {
        let mailer = Arc::new(RecordingMailer::default());
        let f = fixture(mailer.clone()).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap();
        settle(created.notifications).await;

        let ghost = Uuid::new_v4();
        let triage = TriageRequest {
            assigned_to: Some(Some(ghost)),
            ..Default::default()
        };
        let outcome = f
            .service
            .triage(created.value.id, &triage, &f.admin)
            .await
            .unwrap();
        settle(outcome.notifications).await;

        assert_eq!(outcome.value.assigned_to_id, Some(ghost));
        assert!(outcome.value.assigned_to.is_none());
        assert_eq!(mailer.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_fail_update() {
        let f = fixture(Arc::new(FailingMailer)).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap();
        settle(created.notifications).await;

        let triage = TriageRequest {
            status: Some("Resolved".to_string()),
            ..Default::default()
        };
        let outcome = assert_ok!(f.service.triage(created.value.id, &triage, &f.admin).await);
        settle(outcome.notifications).await;

        let stored = f.service.get(created.value.id, &f.alice).await.unwrap();
        assert_eq!(stored.status, ComplaintStatus::Resolved);
    }

    #[tokio::test]
    async fn test_archive_sweep_is_idempotent() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let old = f.service.create(leak(), &f.alice).await.unwrap().detach();
        let fresh = f.service.create(leak(), &f.alice).await.unwrap().detach();
        f.store
            .set_created_at(old.id, Utc::now() - Duration::days(400))
            .await;

        assert_eq!(f.service.archive_sweep(Duration::days(365)).await.unwrap(), 1);
        assert_eq!(f.service.archive_sweep(Duration::days(365)).await.unwrap(), 0);

        let listed: Vec<Uuid> = f
            .service
            .list(&f.admin)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec![fresh.id]);

        let archived = f.service.get(old.id, &f.admin).await.unwrap();
        assert!(archived.archived);

        let edit = ComplaintRequest {
            title: Some("Still leaking".to_string()),
            ..Default::default()
        };
        let err = assert_err!(f.service.update_content(old.id, &edit, &f.alice).await);
        assert!(matches!(err, AppError::Forbidden(_)));

        assert_ok!(f.service.delete(old.id, &f.alice).await);
        let err = assert_err!(f.service.get(old.id, &f.admin).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_note_rejects_blank_text() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let created = f.service.create(leak(), &f.alice).await.unwrap().detach();

        let err = assert_err!(f.service.add_note(created.id, "   ", &f.admin).await);
        assert!(matches!(err, AppError::Validation(_)));

        let noted = f
            .service
            .add_note(created.id, "first", &f.admin)
            .await
            .unwrap();
        let noted = f.service.add_note(noted.id, "second", &f.admin).await.unwrap();
        let texts: Vec<String> = noted
            .internal_notes
            .unwrap()
            .into_iter()
            .map(|n| n.text)
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let first = f.service.create(leak(), &f.alice).await.unwrap().detach();
        let mut low = leak();
        low.priority = Priority::Low;
        low.department = "IT".to_string();
        f.service.create(low, &f.bob).await.unwrap();

        let triage = TriageRequest {
            status: Some("Resolved".to_string()),
            ..Default::default()
        };
        f.service.triage(first.id, &triage, &f.admin).await.unwrap();

        let stats = f.service.stats().await.unwrap();
        assert_eq!(stats.total_complaints, 2);
        assert_eq!(stats.pending_complaints, 1);
        assert_eq!(stats.resolved_complaints, 1);
        assert_eq!(stats.high_priority_complaints, 1);
        assert_eq!(
            stats.complaints_by_category,
            vec![
                GroupCount { key: "IT".to_string(), count: 1 },
                GroupCount { key: "Maintenance".to_string(), count: 1 },
            ]
        );
        assert_eq!(stats.resolution_trends.len(), 1);
        assert_eq!(stats.resolution_trends[0].count, 1);
    }

    #[tokio::test]
    async fn test_report_quotes_fields() {
        let f = fixture(Arc::new(RecordingMailer::default())).await;
        let mut submission = leak();
        submission.title = "Leak, \"big\" one".to_string();
        f.service.create(submission, &f.alice).await.unwrap();

        let report = f.service.report().await.unwrap();
        let mut lines = report.lines();
        assert_eq!(lines.next(), Some(REPORT_HEADER));
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"Leak, \"\"big\"\" one\",alice,Maintenance,High,New,Unassigned,"));
    }

    #[test]
    fn test_csv_field_plain_value_unquoted() {
        assert_eq!(csv_field("Maintenance"), "Maintenance");
        assert_eq!(csv_field("a\nb"), "\"a\nb\"");
    }
}
