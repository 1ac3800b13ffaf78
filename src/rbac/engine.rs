use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::audit::{AuditEmitter, AuditEvent, AuditOutcome, RequestMeta};
use crate::auth::AuthError;
use crate::database::models::UserRecord;
use crate::rbac::capability::{Capability, Needs, RecordScope, Requirement, RestrictedRole, RoleName};
use crate::rbac::scope::DataScope;
use crate::rbac::store::AccessStore;

pub const ACCESS_GRANTED: &str = "ACCESS_GRANTED";
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
pub const ROLE_ACCESS_DENIED: &str = "ROLE_ACCESS_DENIED";
pub const SCOPE_DENIED: &str = "SCOPE_DENIED";
pub const INVALID_SUBJECT: &str = "INVALID_SUBJECT";

/// A user's roles and the permissions each role carries, loaded fresh for one request.
#[derive(Debug, Clone, Serialize)]
pub struct AccessContext {
    pub user: UserRecord,
    pub roles: BTreeMap<RoleName, BTreeSet<Capability>>,
}

impl AccessContext {
    /// Union over every role. Empty for a user with no roles.
    pub fn effective_permissions(&self) -> BTreeSet<Capability> {
        self.roles.values().flatten().cloned().collect()
    }

    pub fn is_admin_tier(&self) -> bool {
        self.roles.keys().any(RoleName::is_admin_tier)
    }

    pub fn role_names(&self) -> Vec<String> {
        self.roles.keys().map(|r| r.to_string()).collect()
    }
}

/// Loads the subject's activity state and grants. A missing or inactive
/// user fails closed.
pub async fn load_context<S>(store: &mut S, user_id: i32) -> Result<AccessContext, AuthError>
where
    S: AccessStore + ?Sized,
{
    let user = match store.find_user(user_id).await? {
        Some(user) if user.is_active => user,
        Some(_) => {
            debug!(user_id, "session subject is inactive");
            return Err(AuthError::Unauthenticated);
        }
        None => {
            debug!(user_id, "session subject does not exist in tenant");
            return Err(AuthError::Unauthenticated);
        }
    };

    let mut roles: BTreeMap<RoleName, BTreeSet<Capability>> = BTreeMap::new();
    for row in store.role_grants(user_id).await? {
        let caps = roles.entry(RoleName::new(row.role)).or_default();
        if let Some(permission) = row.permission {
            caps.insert(Capability::new(permission));
        }
    }

    Ok(AccessContext { user, roles })
}

#[derive(Debug, Clone)]
pub struct AccessRequest<'r> {
    pub subject: i32,
    pub requirement: &'r Requirement,
    /// Record the handler is about to touch, when there is exactly one.
    pub target: Option<i32>,
    pub meta: RequestMeta,
}

impl<'r> AccessRequest<'r> {
    pub fn new(subject: i32, requirement: &'r Requirement) -> Self {
        Self {
            subject,
            requirement,
            target: None,
            meta: RequestMeta::default(),
        }
    }

    pub fn target(mut self, id: i32) -> Self {
        self.target = Some(id);
        self
    }

    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Successful authorization. Handlers must apply `scope` to what they return.
#[derive(Debug, Clone)]
pub struct Grant {
    pub user_id: i32,
    pub scope: DataScope,
    pub matched_roles: Vec<RoleName>,
    pub context: AccessContext,
}

/// Stateless per-request authorization: identify, load, coarse check,
/// scope, decide, audit.
#[derive(Clone)]
pub struct Authorizer {
    audit: AuditEmitter,
}

impl Authorizer {
    pub fn new(audit: AuditEmitter) -> Self {
        Self { audit }
    }

    pub fn audit(&self) -> &AuditEmitter {
        &self.audit
    }

    pub async fn authorize<S>(&self, store: &mut S, request: &AccessRequest<'_>) -> Result<Grant, AuthError>
    where
        S: AccessStore + ?Sized,
    {
        let requirement = request.requirement;

        let context = match load_context(store, request.subject).await {
            Ok(context) => context,
            Err(AuthError::Unauthenticated) => {
                self.emit(request, INVALID_SUBJECT, AuditOutcome::Denied, json!({
                    "required": requirement.required_names(),
                    "reason": "missing or inactive user",
                }))
                .await;
                return Err(AuthError::Unauthenticated);
            }
            Err(err) => return Err(err),
        };

        let actual: Vec<String> = context
            .effective_permissions()
            .iter()
            .map(|c| c.to_string())
            .collect();

        let matched_roles = if context.is_admin_tier() {
            context
                .roles
                .keys()
                .filter(|r| r.is_admin_tier())
                .cloned()
                .collect::<Vec<_>>()
        } else {
            let matched = matching_roles(&context, &requirement.needs);
            if matched.is_empty() {
                let (action, err) = match requirement.needs {
                    Needs::AnyPermission(_) => (PERMISSION_DENIED, AuthError::InsufficientPermission),
                    Needs::AnyRole(_) => (ROLE_ACCESS_DENIED, AuthError::InsufficientRole),
                };
                info!(user_id = request.subject, resource = %requirement.resource_type, "{}", action);
                self.emit(request, action, AuditOutcome::Denied, json!({
                    "required": requirement.required_names(),
                    "actual": actual,
                    "roles": context.role_names(),
                }))
                .await;
                return Err(err);
            }
            matched
        };

        let scope = if context.is_admin_tier() {
            DataScope::All
        } else {
            narrow(store, &context, requirement, &matched_roles).await?
        };

        if let Some(target) = request.target {
            let visible = match requirement.records {
                RecordScope::Unscoped => true,
                RecordScope::Students => scope.permits_student(target),
                RecordScope::Classes => scope.permits_class(target),
            };
            if !visible {
                self.emit(request, SCOPE_DENIED, AuditOutcome::Denied, json!({
                    "required": requirement.required_names(),
                    "actual": actual,
                    "roles": context.role_names(),
                }))
                .await;
                return Err(AuthError::NotFound);
            }
        }

        self.emit(request, ACCESS_GRANTED, AuditOutcome::Granted, json!({
            "required": requirement.required_names(),
            "actual": actual,
            "matched_roles": matched_roles.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
            "scope": scope,
        }))
        .await;

        Ok(Grant {
            user_id: request.subject,
            scope,
            matched_roles,
            context,
        })
    }

    async fn emit(&self, request: &AccessRequest<'_>, action: &str, outcome: AuditOutcome, details: serde_json::Value) {
        let event = AuditEvent::new(Some(request.subject), action, outcome, request.requirement.resource_type.clone())
            .resource_id(request.target)
            .after(details)
            .request(request.meta.clone());
        self.audit.record(event).await;
    }
}

/// Roles through which the requirement is satisfied.
fn matching_roles(context: &AccessContext, needs: &Needs) -> Vec<RoleName> {
    match needs {
        Needs::AnyPermission(required) => context
            .roles
            .iter()
            .filter(|(_, caps)| !caps.is_disjoint(required))
            .map(|(role, _)| role.clone())
            .collect(),
        Needs::AnyRole(required) => context
            .roles
            .keys()
            .filter(|role| required.contains(*role))
            .cloned()
            .collect(),
    }
}

/// Whether a restricted role carries the scoping capability for this requirement.
fn holds_scoping_capability(caps: &BTreeSet<Capability>, qualifier: &str, needs: &Needs) -> bool {
    caps.iter().filter(|cap| cap.has_qualifier(qualifier)).any(|cap| match needs {
        Needs::AnyPermission(required) => {
            required.contains(cap) || cap.base().map(|base| required.contains(&base)).unwrap_or(false)
        }
        Needs::AnyRole(_) => true,
    })
}

async fn narrow<S>(
    store: &mut S,
    context: &AccessContext,
    requirement: &Requirement,
    matched_roles: &[RoleName],
) -> Result<DataScope, AuthError>
where
    S: AccessStore + ?Sized,
{
    if requirement.records == RecordScope::Unscoped {
        return Ok(DataScope::All);
    }

    let mut restricted: Vec<(RestrictedRole, &RoleName)> = Vec::new();
    for role in matched_roles {
        match role.restricted() {
            Some(kind) => restricted.push((kind, role)),
            // A matching role with no scoping relation sees everything
            None => return Ok(DataScope::All),
        }
    }
    restricted.sort_by_key(|(kind, _)| *kind);

    let user_id = context.user.id;
    let mut scope = DataScope::nothing();
    for (kind, role) in restricted {
        let caps = context.roles.get(role).cloned().unwrap_or_default();
        let contribution = match kind {
            RestrictedRole::Teacher => match requirement.records {
                RecordScope::Students => return Ok(DataScope::All),
                _ => DataScope::classes(store.teaching_assignments(user_id).await?),
            },
            RestrictedRole::Parent | RestrictedRole::Student => {
                let qualifier = kind.scoping_qualifier().unwrap_or_default();
                if !holds_scoping_capability(&caps, qualifier, &requirement.needs) {
                    debug!(user_id, role = %role, "restricted role lacks scoping capability");
                    DataScope::nothing()
                } else if kind == RestrictedRole::Parent {
                    DataScope::students(store.linked_children(user_id).await?)
                } else {
                    DataScope::students(store.own_student_record(user_id).await?)
                }
            }
        };
        scope = scope.merge(contribution);
    }

    Ok(scope)
}
