//! In-process store used without a database and in tests

use super::*;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    complaints: RwLock<Vec<Complaint>>,
    categories: RwLock<Vec<Category>>,
    departments: RwLock<Vec<Department>>,
    activities: RwLock<Vec<Activity>>,
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
}

fn clashes(users: &[User], except: Option<Uuid>, username: &str, email: &str) -> bool {
    users.iter().any(|u| {
        Some(u.id) != except
            && (u.username == username || u.email.eq_ignore_ascii_case(email))
    })
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if clashes(&users, None, &user.username, &user.email) {
            return Err(StoreError::Duplicate("Username or Email".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| ids.contains(&u.id)).cloned().collect())
    }

    async fn find_by_login(&self, identifier: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.username == identifier || u.email.eq_ignore_ascii_case(identifier))
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut users = self.users.write().await;
        let Some(current) = users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        let username = changes.username.unwrap_or(current.username);
        let email = changes.email.unwrap_or(current.email);
        if clashes(&users, Some(id), &username, &email) {
            return Err(StoreError::Duplicate("Username or Email".to_string()));
        }

        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.username = username;
        user.email = email;
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn insert(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        let now = Utc::now();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            title: complaint.title,
            description: complaint.description,
            department: complaint.department,
            priority: complaint.priority,
            status: ComplaintStatus::New,
            owner_id: complaint.owner_id,
            assigned_to: None,
            internal_notes: Vec::new(),
            public_response: None,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        self.complaints.write().await.push(complaint.clone());
        Ok(complaint)
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Complaint>> {
        Ok(self
            .complaints
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list(&self, query: ComplaintQuery) -> StoreResult<Vec<Complaint>> {
        let mut found: Vec<Complaint> = self
            .complaints
            .read()
            .await
            .iter()
            .filter(|c| query.include_archived || !c.archived)
            .filter(|c| query.owner_id.map_or(true, |owner| c.owner_id == owner))
            .cloned()
            .collect();
        newest_first(&mut found, |c| c.created_at);
        Ok(found)
    }

    async fn save(&self, complaint: &Complaint) -> StoreResult<Option<Complaint>> {
        let mut complaints = self.complaints.write().await;
        let Some(stored) = complaints.iter_mut().find(|c| c.id == complaint.id) else {
            return Ok(None);
        };
        stored.title = complaint.title.clone();
        stored.description = complaint.description.clone();
        stored.department = complaint.department.clone();
        stored.priority = complaint.priority;
        stored.status = complaint.status;
        stored.assigned_to = complaint.assigned_to;
        stored.public_response = complaint.public_response.clone();
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn append_note(&self, id: Uuid, note: InternalNote) -> StoreResult<Option<Complaint>> {
        let mut complaints = self.complaints.write().await;
        let Some(stored) = complaints.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        stored.internal_notes.push(note);
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut complaints = self.complaints.write().await;
        let before = complaints.len();
        complaints.retain(|c| c.id != id);
        Ok(complaints.len() != before)
    }

    async fn archive_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut complaints = self.complaints.write().await;
        let mut archived = 0;
        for complaint in complaints
            .iter_mut()
            .filter(|c| !c.archived && c.created_at < cutoff)
        {
            complaint.archived = true;
            archived += 1;
        }
        Ok(archived)
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Category>> {
        Ok(self.categories.read().await.clone())
    }

    async fn create(&self, name: &str) -> StoreResult<Category> {
        let mut categories = self.categories.write().await;
        if categories.iter().any(|c| c.name == name) {
            return Err(StoreError::Duplicate("Category with that name".to_string()));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn rename(&self, id: Uuid, name: &str) -> StoreResult<Option<Category>> {
        let mut categories = self.categories.write().await;
        if categories.iter().any(|c| c.id != id && c.name == name) {
            return Err(StoreError::Duplicate("Category with that name".to_string()));
        }
        Ok(categories.iter_mut().find(|c| c.id == id).map(|c| {
            c.name = name.to_string();
            c.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut categories = self.categories.write().await;
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() != before)
    }
}

#[async_trait]
impl DepartmentStore for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Department>> {
        Ok(self.departments.read().await.clone())
    }

    async fn create(&self, name: &str, manager_id: Option<Uuid>) -> StoreResult<Department> {
        let mut departments = self.departments.write().await;
        if departments.iter().any(|d| d.name == name) {
            return Err(StoreError::Duplicate("Department with that name".to_string()));
        }
        let department = Department {
            id: Uuid::new_v4(),
            name: name.to_string(),
            manager_id,
            created_at: Utc::now(),
        };
        departments.push(department.clone());
        Ok(department)
    }

    async fn update(&self, id: Uuid, changes: DepartmentChanges) -> StoreResult<Option<Department>> {
        let mut departments = self.departments.write().await;
        if let Some(name) = &changes.name {
            if departments.iter().any(|d| d.id != id && &d.name == name) {
                return Err(StoreError::Duplicate("Department with that name".to_string()));
            }
        }
        Ok(departments.iter_mut().find(|d| d.id == id).map(|d| {
            if let Some(name) = changes.name {
                d.name = name;
            }
            if let Some(manager_id) = changes.manager_id {
                d.manager_id = manager_id;
            }
            d.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut departments = self.departments.write().await;
        let before = departments.len();
        departments.retain(|d| d.id != id);
        Ok(departments.len() != before)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn record(&self, description: &str) -> StoreResult<Activity> {
        let activity = Activity {
            id: Uuid::new_v4(),
            description: description.to_string(),
            created_at: Utc::now(),
        };
        self.activities.write().await.push(activity.clone());
        Ok(activity)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        let mut activities = self.activities.read().await.clone();
        newest_first(&mut activities, |a| a.created_at);
        activities.truncate(limit);
        Ok(activities)
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Backdates a complaint so archive sweeps can be exercised.
    pub async fn set_created_at(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(c) = self.complaints.write().await.iter_mut().find(|c| c.id == id) {
            c.created_at = created_at;
        }
    }
}
