// handlers/protected/students.rs - GET /api/students/:id/access handler
//
// Visibility check: answers whether the caller may see one student record,
// going through the same guard every student handler declares.

use axum::{
    extract::{Path, State},
    Extension,
};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::app::AppState;
use crate::auth::AuthError;
use crate::middleware::{ApiResponse, ApiResult, Session, TenantContext};
use crate::rbac::{AccessRequest, DataScope, PgAccessStore, RecordScope, Requirement};

static READ_STUDENT: Lazy<Requirement> = Lazy::new(|| {
    Requirement::permissions(["students.read", "students.read.children", "students.read.own"])
        .on("student")
        .scoped_to(RecordScope::Students)
});

#[derive(Debug, Serialize)]
pub struct StudentAccess {
    pub student_id: i32,
    pub visible: bool,
    pub scope: DataScope,
    pub matched_roles: Vec<String>,
}

pub async fn student_access(
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
    Extension(session): Extension<Session>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<StudentAccess> {
    let authorizer = state.authorizer.clone();
    let meta = ctx.meta.clone();
    let subject = session.user_id;

    let access = state
        .uow
        .run_in_tenant(&ctx.tenant.schema, move |tx| {
            Box::pin(async move {
                let request = AccessRequest::new(subject, &READ_STUDENT)
                    .target(student_id)
                    .meta(meta);
                let grant = {
                    let mut store = PgAccessStore::new(tx.conn());
                    authorizer.authorize(&mut store, &request).await?
                };

                // In scope but absent is reported the same way as out of scope
                let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM students WHERE id = $1")
                    .bind(student_id)
                    .fetch_optional(tx.conn())
                    .await?
                    .is_some();
                if !exists {
                    return Err(AuthError::NotFound);
                }

                Ok(StudentAccess {
                    student_id,
                    visible: true,
                    matched_roles: grant.matched_roles.iter().map(|r| r.to_string()).collect(),
                    scope: grant.scope,
                })
            })
        })
        .await?;

    Ok(ApiResponse::success(access))
}
