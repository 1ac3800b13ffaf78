//! Per-request loading of the data the authorizer decides on.
//!
//! Nothing here is cached: each call reads the current state of the pinned
//! tenant transaction so that revocations apply to the very next request.

use async_trait::async_trait;
use sqlx::PgConnection;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use crate::auth::AuthError;
use crate::database::models::UserRecord;
use crate::rbac::scope::ClassAssignment;

/// One row of the user → role → permission join. Roles without any
/// permission still appear, with `permission` set to `None`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RoleGrantRow {
    pub role: String,
    pub permission: Option<String>,
}

#[async_trait]
pub trait AccessStore: Send {
    async fn find_user(&mut self, user_id: i32) -> Result<Option<UserRecord>, AuthError>;
    async fn role_grants(&mut self, user_id: i32) -> Result<Vec<RoleGrantRow>, AuthError>;
    async fn linked_children(&mut self, parent_user_id: i32) -> Result<BTreeSet<i32>, AuthError>;
    async fn own_student_record(&mut self, user_id: i32) -> Result<Option<i32>, AuthError>;
    async fn teaching_assignments(&mut self, user_id: i32) -> Result<BTreeSet<ClassAssignment>, AuthError>;
}

/// Reads through the tenant-pinned connection; unqualified table names
/// resolve into the tenant schema.
pub struct PgAccessStore<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgAccessStore<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'a> AccessStore for PgAccessStore<'a> {
    async fn find_user(&mut self, user_id: i32) -> Result<Option<UserRecord>, AuthError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, COALESCE(full_name, '') AS full_name, is_active FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(user)
    }

    async fn role_grants(&mut self, user_id: i32) -> Result<Vec<RoleGrantRow>, AuthError> {
        let rows = sqlx::query_as::<_, RoleGrantRow>(
            "SELECT r.name AS role, p.name AS permission
             FROM user_roles ur
             JOIN roles r ON r.id = ur.role_id
             LEFT JOIN role_permissions rp ON rp.role_id = r.id
             LEFT JOIN permissions p ON p.id = rp.permission_id
             WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows)
    }

    async fn linked_children(&mut self, parent_user_id: i32) -> Result<BTreeSet<i32>, AuthError> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT student_id FROM parent_students WHERE parent_user_id = $1",
        )
        .bind(parent_user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(ids.into_iter().collect())
    }

    async fn own_student_record(&mut self, user_id: i32) -> Result<Option<i32>, AuthError> {
        let id = sqlx::query_scalar::<_, i32>("SELECT id FROM students WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(id)
    }

    async fn teaching_assignments(&mut self, user_id: i32) -> Result<BTreeSet<ClassAssignment>, AuthError> {
        let rows = sqlx::query_as::<_, (i32, i32)>(
            "SELECT class_id, subject_id FROM teacher_assignments WHERE teacher_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(class_id, subject_id)| ClassAssignment { class_id, subject_id })
            .collect())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i32, UserRecord>,
    user_roles: BTreeMap<i32, BTreeSet<String>>,
    role_permissions: BTreeMap<String, BTreeSet<String>>,
    children: BTreeMap<i32, BTreeSet<i32>>,
    own_records: BTreeMap<i32, i32>,
    assignments: BTreeMap<i32, BTreeSet<ClassAssignment>>,
}

/// In-memory tenant used by tests and local tooling. Mutations are visible
/// to the next read, mirroring the uncached Postgres store.
#[derive(Debug, Default)]
pub struct MemoryAccessStore {
    state: RwLock<MemoryState>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn with_user(self, id: i32, email: &str, is_active: bool) -> Self {
        self.write().users.insert(
            id,
            UserRecord {
                id,
                email: email.to_string(),
                full_name: String::new(),
                is_active,
            },
        );
        self
    }

    pub fn grant_role(self, user_id: i32, role: &str) -> Self {
        self.write()
            .user_roles
            .entry(user_id)
            .or_default()
            .insert(role.to_string());
        self
    }

    pub fn allow(&self, role: &str, permission: &str) -> &Self {
        self.write()
            .role_permissions
            .entry(role.to_string())
            .or_default()
            .insert(permission.to_string());
        self
    }

    pub fn revoke(&self, role: &str, permission: &str) -> &Self {
        if let Some(perms) = self.write().role_permissions.get_mut(role) {
            perms.remove(permission);
        }
        self
    }

    pub fn link_child(self, parent_user_id: i32, student_id: i32) -> Self {
        self.write()
            .children
            .entry(parent_user_id)
            .or_default()
            .insert(student_id);
        self
    }

    pub fn own_record(self, user_id: i32, student_id: i32) -> Self {
        self.write().own_records.insert(user_id, student_id);
        self
    }

    pub fn assign(self, teacher_user_id: i32, class_id: i32, subject_id: i32) -> Self {
        self.write()
            .assignments
            .entry(teacher_user_id)
            .or_default()
            .insert(ClassAssignment { class_id, subject_id });
        self
    }
}

#[async_trait]
impl<'a> AccessStore for &'a MemoryAccessStore {
    async fn find_user(&mut self, user_id: i32) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.read().users.get(&user_id).cloned())
    }

    async fn role_grants(&mut self, user_id: i32) -> Result<Vec<RoleGrantRow>, AuthError> {
        let state = self.read();
        let mut rows = Vec::new();
        for role in state.user_roles.get(&user_id).into_iter().flatten() {
            match state.role_permissions.get(role) {
                Some(perms) if !perms.is_empty() => {
                    rows.extend(perms.iter().map(|p| RoleGrantRow {
                        role: role.clone(),
                        permission: Some(p.clone()),
                    }));
                }
                _ => rows.push(RoleGrantRow {
                    role: role.clone(),
                    permission: None,
                }),
            }
        }
        Ok(rows)
    }

    async fn linked_children(&mut self, parent_user_id: i32) -> Result<BTreeSet<i32>, AuthError> {
        Ok(self.read().children.get(&parent_user_id).cloned().unwrap_or_default())
    }

    async fn own_student_record(&mut self, user_id: i32) -> Result<Option<i32>, AuthError> {
        Ok(self.read().own_records.get(&user_id).copied())
    }

    async fn teaching_assignments(&mut self, user_id: i32) -> Result<BTreeSet<ClassAssignment>, AuthError> {
        Ok(self.read().assignments.get(&user_id).cloned().unwrap_or_default())
    }
}
