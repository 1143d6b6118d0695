mod common;

use common::*;
use tokio_util::sync::CancellationToken;
use vmprov_vsphere::error::ProvisionErrorKind;
use vmprov_vsphere::resolver::{AmbiguityPolicy, InventoryResolver};
use vmprov_vsphere::types::*;

#[tokio::test]
async fn every_resolved_reference_has_the_requested_kind() {
    let fake = FakeInventory::lab();
    let token = CancellationToken::new();
    let scoped = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC1")
        .await
        .unwrap();

    assert_eq!(scoped.scope().datacenter().kind, InventoryKind::Datacenter);
    let cluster = scoped.cluster("PRD").await.unwrap();
    assert_eq!(cluster.kind, InventoryKind::ClusterComputeResource);
    let pool = scoped.resource_pool(&cluster, Some("gold")).await.unwrap();
    assert_eq!(pool.kind, InventoryKind::ResourcePool);
    assert_eq!(pool.id, "resgroup-20");
    assert_eq!(scoped.datastore("ds01").await.unwrap().kind, InventoryKind::Datastore);
    assert_eq!(
        scoped.network("NET1").await.unwrap().kind,
        InventoryKind::DistributedVirtualPortgroup
    );
    assert_eq!(scoped.template("T").await.unwrap().kind, InventoryKind::VirtualMachine);
    assert_eq!(scoped.folder("Apps").await.unwrap().kind, InventoryKind::Folder);
}

#[tokio::test]
async fn empty_pool_name_resolves_cluster_root_pool() {
    let fake = FakeInventory::lab();
    let token = CancellationToken::new();
    let scoped = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC1")
        .await
        .unwrap();
    let cluster = scoped.cluster("PRD").await.unwrap();

    let pool = scoped.resource_pool(&cluster, Some("")).await.unwrap();
    assert_eq!(pool, r(InventoryKind::ResourcePool, "resgroup-8"));
    assert_eq!(scoped.resource_pool(&cluster, None).await.unwrap(), pool);
    assert_eq!(scoped.resource_pool(&cluster, None).await.unwrap(), pool);
}

#[tokio::test]
async fn template_by_name_and_by_path_agree() {
    let fake = FakeInventory::lab();
    let token = CancellationToken::new();
    let scoped = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC1")
        .await
        .unwrap();
    let by_name = scoped.template("T").await.unwrap();
    let by_path = scoped.template("/DC1/vm/Templates/T").await.unwrap();
    assert_eq!(by_name, by_path);
}

#[tokio::test]
async fn unknown_objects_are_not_found() {
    let fake = FakeInventory::lab();
    let token = CancellationToken::new();

    let err = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC9")
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind, ProvisionErrorKind::NotFound);

    let scoped = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC1")
        .await
        .unwrap();
    for err in [
        scoped.cluster("QA").await.unwrap_err(),
        scoped.datastore("ds99").await.unwrap_err(),
        scoped.template("/DC1/vm/Templates/missing").await.unwrap_err(),
        scoped.folder("Nope").await.unwrap_err(),
    ] {
        assert_eq!(err.kind, ProvisionErrorKind::NotFound, "{err}");
    }
}

#[tokio::test]
async fn objects_in_other_datacenters_are_invisible() {
    let mut fake = FakeInventory::lab();
    fake.add("DC2", InventoryKind::Datastore, "ds-remote", "datastore-77");
    let token = CancellationToken::new();
    let scoped = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC1")
        .await
        .unwrap();
    let err = scoped.datastore("ds-remote").await.unwrap_err();
    assert_eq!(err.kind, ProvisionErrorKind::NotFound);
}

#[tokio::test]
async fn duplicate_names_follow_the_ambiguity_policy() {
    let mut fake = FakeInventory::lab();
    fake.add("DC1", InventoryKind::VirtualMachine, "T", "vm-11");
    let token = CancellationToken::new();

    let lenient = InventoryResolver::new(&fake, &token, AmbiguityPolicy::FirstMatch)
        .establish("DC1")
        .await
        .unwrap();
    assert_eq!(lenient.template("T").await.unwrap().id, "vm-10");

    let strict = InventoryResolver::new(&fake, &token, AmbiguityPolicy::Reject)
        .establish("DC1")
        .await
        .unwrap();
    let err = strict.template("T").await.unwrap_err();
    assert_eq!(err.kind, ProvisionErrorKind::Ambiguous);
    // The path form is never ambiguous.
    assert_eq!(strict.template("/DC1/vm/Templates/T").await.unwrap().id, "vm-10");
}

// Scenario C
#[tokio::test]
async fn scenario_c_blank_pool_name_is_not_a_failure() {
    let fake = FakeInventory::lab();
    let token = CancellationToken::new();
    let scoped = InventoryResolver::new(&fake, &token, AmbiguityPolicy::default())
        .establish("DC1")
        .await
        .unwrap();
    let cluster = scoped.cluster("PRD").await.unwrap();
    let pool = scoped.resource_pool(&cluster, Some("")).await.unwrap();
    assert_eq!(pool.id, "resgroup-8");
}
