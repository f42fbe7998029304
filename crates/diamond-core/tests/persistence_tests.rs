use diamond_core::{
    AddressBook, LocalDeployer, ModuleRequest, UpgradeConfig, UpgradeOrchestrator, UpgradeRequest,
};
use diamond_kernel::{AuditLog, AuditOutcome};
use diamond_table::{FacetCut, TableReader};
use diamond_core::fixtures::{character_interface, loupe_interface};
use diamond_test_utils::{addr, local_authority, sel, seeded_authority};
use std::fs;
use std::sync::Arc;

#[tokio::test]
async fn test_address_book_and_audit_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("upgrade.toml");
    fs::write(
        &config_path,
        format!(
            "operator = \"owner\"\naddress_book = {:?}\naudit_log = {:?}\n\n[confirmation]\npoll_interval_ms = 1\n",
            dir.path().join("deployments").join("addresses.json"),
            dir.path().join("audit.jsonl"),
        ),
    )
    .unwrap();
    let config = UpgradeConfig::load(&config_path).unwrap();

    let authority = local_authority();
    let first = {
        let orchestrator = UpgradeOrchestrator::new(
            config.clone(),
            authority.clone(),
            Arc::new(LocalDeployer::default()),
        )
        .unwrap();
        orchestrator
            .run(UpgradeRequest::new().with_module(ModuleRequest::deploy(character_interface())))
            .await
            .unwrap()
    };
    let deployed = first.address_of("CharacterFacet").unwrap();

    let book = AddressBook::load(dir.path().join("deployments").join("addresses.json")).unwrap();
    let record = book.latest("localhost", "CharacterFacet").unwrap();
    assert_eq!(record.address, deployed);
    assert_eq!(record.transaction, Some(first.transaction_id));

    let restarted = UpgradeOrchestrator::new(
        config,
        authority.clone(),
        Arc::new(LocalDeployer::default()),
    )
    .unwrap();
    let again = restarted
        .run(UpgradeRequest::new().with_module(ModuleRequest::recorded(character_interface())))
        .await
        .unwrap();
    assert_eq!(again.address_of("CharacterFacet"), Some(deployed));
    assert!(again.plan.is_empty());

    let audit = restarted.audit_log();
    assert_eq!(audit.len(), 2);
    audit.verify_integrity().unwrap();
    assert!(audit.records().iter().all(|r| r.outcome == AuditOutcome::Complete));
}

#[tokio::test]
async fn test_unsaved_address_book_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "").unwrap();

    let orchestrator = UpgradeOrchestrator::new(
        UpgradeConfig::new().with_poll_interval_ms(1),
        local_authority(),
        Arc::new(LocalDeployer::default()),
    )
    .unwrap()
    .with_address_book(AddressBook::load(blocker.join("addresses.json")).unwrap());

    let report = orchestrator
        .run(UpgradeRequest::new().with_module(ModuleRequest::deploy(loupe_interface())))
        .await
        .unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(orchestrator.address_book().latest("localhost", "DiamondLoupeFacet").is_some());
}

#[tokio::test]
async fn test_purge_of_legacy_routes() {
    let authority = seeded_authority([(sel(1), addr(1)), (sel(2), addr(1)), (sel(3), addr(2))]);
    let orchestrator = UpgradeOrchestrator::new(
        UpgradeConfig::new().with_poll_interval_ms(1),
        authority.clone(),
        Arc::new(LocalDeployer::default()),
    )
    .unwrap();

    let report = orchestrator
        .run(UpgradeRequest::new().with_purge([sel(3), sel(1), sel(77)]))
        .await
        .unwrap();

    assert_eq!(report.plan.cuts(), &[FacetCut::remove([sel(1), sel(3)])]);
    assert_eq!(authority.table().resolve(sel(2)), Some(addr(1)));
    assert_eq!(authority.table().len(), 1);
}

#[tokio::test]
async fn test_configured_endpoint_is_resolved() {
    let config = UpgradeConfig::from_toml_str(
        "[network]\nname = \"testnet\"\nendpoint = \"http://10.0.0.7:8545\"\n",
    )
    .unwrap();
    let orchestrator =
        UpgradeOrchestrator::new(config, local_authority(), Arc::new(LocalDeployer::default()))
            .unwrap();
    assert_eq!(orchestrator.endpoint(), Some("http://10.0.0.7:8545"));
    assert!(format!("{orchestrator:?}").contains("10.0.0.7"));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_lost_audit_record_is_a_warning() {
    let audit = Arc::new(AuditLog::open("/dev/full").unwrap());
    let authority = local_authority();
    let orchestrator = UpgradeOrchestrator::new(
        UpgradeConfig::new().with_poll_interval_ms(1),
        authority.clone(),
        Arc::new(LocalDeployer::default()),
    )
    .unwrap()
    .with_audit_log(audit.clone());

    let report = orchestrator
        .run(UpgradeRequest::new().with_module(ModuleRequest::deploy(loupe_interface())))
        .await
        .unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("audit record not written"));
    assert!(audit.is_empty());
    assert_eq!(authority.table().len(), 5);
}
