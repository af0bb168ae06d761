//! PostgreSQL adapter

use super::*;
use sqlx::FromRow;
use std::collections::HashMap;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Batch fetch notes for a set of complaints (avoid N+1 query)
    async fn with_notes(&self, rows: Vec<ComplaintRow>) -> StoreResult<Vec<Complaint>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let notes = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT complaint_id, text, author_id, created_at
            FROM complaint_notes
            WHERE complaint_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut notes_by_complaint: HashMap<Uuid, Vec<InternalNote>> = HashMap::new();
        for note in notes {
            notes_by_complaint
                .entry(note.complaint_id)
                .or_default()
                .push(InternalNote {
                    text: note.text,
                    author_id: note.author_id,
                    created_at: note.created_at,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let notes = notes_by_complaint.remove(&row.id).unwrap_or_default();
                row.into_complaint(notes)
            })
            .collect())
    }

    async fn with_notes_one(&self, row: Option<ComplaintRow>) -> StoreResult<Option<Complaint>> {
        match row {
            Some(row) => Ok(self.with_notes(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[derive(Debug, FromRow)]
struct ComplaintRow {
    id: Uuid,
    title: String,
    description: String,
    department: String,
    priority: Priority,
    status: ComplaintStatus,
    owner_id: Uuid,
    assigned_to: Option<Uuid>,
    public_response: Option<String>,
    archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ComplaintRow {
    fn into_complaint(self, internal_notes: Vec<InternalNote>) -> Complaint {
        Complaint {
            id: self.id,
            title: self.title,
            description: self.description,
            department: self.department,
            priority: self.priority,
            status: self.status,
            owner_id: self.owner_id,
            assigned_to: self.assigned_to,
            internal_notes,
            public_response: self.public_response,
            archived: self.archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct NoteRow {
    complaint_id: Uuid,
    text: String,
    author_id: Uuid,
    created_at: DateTime<Utc>,
}

fn unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(what.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username or Email"))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_many(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_by_login(&self, identifier: &str) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 OR LOWER(email) = LOWER($1) LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username = COALESCE($1, username),
                email = COALESCE($2, email),
                role = COALESCE($3, role)
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(changes.role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username or Email"))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ComplaintStore for PgStore {
    async fn insert(&self, complaint: NewComplaint) -> StoreResult<Complaint> {
        let row = sqlx::query_as::<_, ComplaintRow>(
            r#"
            INSERT INTO complaints (id, title, description, department, priority, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&complaint.title)
        .bind(&complaint.description)
        .bind(&complaint.department)
        .bind(complaint.priority)
        .bind(complaint.owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_complaint(Vec::new()))
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Complaint>> {
        let row = sqlx::query_as::<_, ComplaintRow>("SELECT * FROM complaints WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        self.with_notes_one(row).await
    }

    async fn list(&self, query: ComplaintQuery) -> StoreResult<Vec<Complaint>> {
        let rows = sqlx::query_as::<_, ComplaintRow>(
            r#"
            SELECT * FROM complaints
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2 OR archived = FALSE)
            ORDER BY created_at DESC
            "#,
        )
        .bind(query.owner_id)
        .bind(query.include_archived)
        .fetch_all(&self.pool)
        .await?;
        self.with_notes(rows).await
    }

    async fn save(&self, complaint: &Complaint) -> StoreResult<Option<Complaint>> {
        let row = sqlx::query_as::<_, ComplaintRow>(
            r#"
            UPDATE complaints SET
                title = $1,
                description = $2,
                department = $3,
                priority = $4,
                status = $5,
                assigned_to = $6,
                public_response = $7,
                updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&complaint.title)
        .bind(&complaint.description)
        .bind(&complaint.department)
        .bind(complaint.priority)
        .bind(complaint.status)
        .bind(complaint.assigned_to)
        .bind(&complaint.public_response)
        .bind(complaint.id)
        .fetch_optional(&self.pool)
        .await?;
        self.with_notes_one(row).await
    }

    async fn append_note(&self, id: Uuid, note: InternalNote) -> StoreResult<Option<Complaint>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO complaint_notes (complaint_id, text, author_id, created_at)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (SELECT 1 FROM complaints WHERE id = $1)
            "#,
        )
        .bind(id)
        .bind(&note.text)
        .bind(note.author_id)
        .bind(note.created_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("UPDATE complaints SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.find(id).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM complaints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn archive_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE complaints
            SET archived = TRUE, updated_at = NOW()
            WHERE archived = FALSE AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn list(&self) -> StoreResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create(&self, name: &str) -> StoreResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Category with that name"))
    }

    async fn rename(&self, id: Uuid, name: &str) -> StoreResult<Option<Category>> {
        sqlx::query_as::<_, Category>("UPDATE categories SET name = $1 WHERE id = $2 RETURNING *")
            .bind(name)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "Category with that name"))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DepartmentStore for PgStore {
    async fn list(&self) -> StoreResult<Vec<Department>> {
        Ok(sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn create(&self, name: &str, manager_id: Option<Uuid>) -> StoreResult<Department> {
        sqlx::query_as::<_, Department>(
            "INSERT INTO departments (id, name, manager_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(manager_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Department with that name"))
    }

    async fn update(&self, id: Uuid, changes: DepartmentChanges) -> StoreResult<Option<Department>> {
        sqlx::query_as::<_, Department>(
            r#"
            UPDATE departments SET
                name = COALESCE($1, name),
                manager_id = CASE WHEN $2 THEN $3 ELSE manager_id END
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&changes.name)
        .bind(changes.manager_id.is_some())
        .bind(changes.manager_id.flatten())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Department with that name"))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn record(&self, description: &str) -> StoreResult<Activity> {
        Ok(sqlx::query_as::<_, Activity>(
            "INSERT INTO activities (id, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(description)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<Activity>> {
        Ok(sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities ORDER BY created_at DESC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?)
    }
}
