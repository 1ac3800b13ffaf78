mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use schoolhub_api::audit::{AuditEmitter, MemoryAuditSink};
use schoolhub_api::auth::AuthError;
use schoolhub_api::rbac::{AccessRequest, Authorizer, DataScope, MemoryAccessStore, RecordScope, Requirement};
use schoolhub_api::tenancy::TenantResolver;

fn authorizer() -> (Authorizer, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    (Authorizer::new(AuditEmitter::new(sink.clone())), sink)
}

fn read_students() -> Requirement {
    Requirement::permissions(["students.read", "students.read.children", "students.read.own"])
        .on("student")
        .scoped_to(RecordScope::Students)
}

#[tokio::test]
async fn teacher_with_generic_read_is_granted_unscoped() -> Result<()> {
    let store = MemoryAccessStore::new()
        .with_user(10, "teacher@northside.edu", true)
        .grant_role(10, "Teacher")
        .assign(10, 3, 1);
    store.allow("Teacher", "academic.read");
    let (authz, _) = authorizer();
    let requirement = Requirement::permissions(["academic.read"]).on("academic");

    let grant = authz.authorize(&mut &store, &AccessRequest::new(10, &requirement)).await?;

    assert_eq!(grant.scope, DataScope::All);
    Ok(())
}

#[tokio::test]
async fn student_own_record_only() -> Result<()> {
    let store = MemoryAccessStore::new()
        .with_user(20, "kid@northside.edu", true)
        .grant_role(20, "Student")
        .own_record(20, 42);
    store.allow("Student", "students.read.own");
    let (authz, sink) = authorizer();
    let requirement = Requirement::permissions(["students.read.own"])
        .on("student")
        .scoped_to(RecordScope::Students);

    let own = authz
        .authorize(&mut &store, &AccessRequest::new(20, &requirement).target(42))
        .await;
    assert!(own.is_ok());

    let other = authz
        .authorize(&mut &store, &AccessRequest::new(20, &requirement).target(43))
        .await;
    assert!(matches!(other, Err(AuthError::NotFound)));

    let denied = sink.events().into_iter().last().expect("denial audited");
    assert_eq!(denied.resource_id, Some(43));
    Ok(())
}

#[tokio::test]
async fn tenant_slug_resolves_to_schema() -> Result<()> {
    let resolver = TenantResolver::new(Arc::new(common::registry()));

    let tenant = resolver.resolve(None, Some("northside")).await?;
    assert_eq!(tenant.schema, "t_northside");

    let missing = resolver.resolve(None, Some("doesnotexist")).await;
    assert!(matches!(missing, Err(AuthError::TenantNotFound(slug)) if slug == "doesnotexist"));
    Ok(())
}

#[tokio::test]
async fn concurrent_parents_never_see_each_others_children() -> Result<()> {
    let store = Arc::new(
        MemoryAccessStore::new()
            .with_user(31, "p1@northside.edu", true)
            .grant_role(31, "Parent")
            .link_child(31, 100)
            .link_child(31, 101)
            .with_user(32, "p2@northside.edu", true)
            .grant_role(32, "Parent")
            .link_child(32, 200),
    );
    store.allow("Parent", "students.read.children");
    let (authz, _) = authorizer();
    let requirement = Arc::new(read_students());

    let mut tasks = Vec::new();
    for round in 0..50 {
        for parent in [31, 32] {
            let store = Arc::clone(&store);
            let authz = authz.clone();
            let requirement = Arc::clone(&requirement);
            tasks.push(tokio::spawn(async move {
                let request = AccessRequest::new(parent, &requirement);
                let mut handle: &MemoryAccessStore = &store;
                let grant = authz.authorize(&mut handle, &request).await?;
                let visible = grant.scope.narrow_students([100, 101, 200, 300 + round]);
                Ok::<_, AuthError>((parent, visible))
            }));
        }
    }

    for task in tasks {
        let (parent, visible) = task.await??;
        let linked: BTreeSet<i32> = match parent {
            31 => [100, 101].into(),
            _ => [200].into(),
        };
        assert!(visible.iter().all(|id| linked.contains(id)), "parent {} saw {:?}", parent, visible);
        assert_eq!(visible.len(), linked.len());
    }
    Ok(())
}

#[tokio::test]
async fn revoked_permission_denies_the_very_next_request() -> Result<()> {
    let store = MemoryAccessStore::new()
        .with_user(40, "officer@northside.edu", true)
        .grant_role(40, "Finance Officer");
    store.allow("Finance Officer", "fees.read");
    let (authz, _) = authorizer();
    let requirement = Requirement::permissions(["fees.read"]).on("fee");

    authz.authorize(&mut &store, &AccessRequest::new(40, &requirement)).await?;

    store.revoke("Finance Officer", "fees.read");
    let after = authz.authorize(&mut &store, &AccessRequest::new(40, &requirement)).await;
    assert!(matches!(after, Err(AuthError::InsufficientPermission)));
    Ok(())
}
