//! Integration tests for the sync engine.
//!
//! These run whole sync passes against a mock remote and a local store,
//! checking the all-or-nothing behaviour of runs.

use chartsync_engine::{
    HealthState, MockFailure, MockRemote, RemoteCall, RemoteEndpoint, StatusLog, SyncConfig,
    SyncEngine, SyncError, SyncOutcome, SyncPhase, SyncRequest, SyncStatus,
};
use chartsync_model::{Domain, Record, Timestamp};
use chartsync_store::{Filter, LocalStore, MemoryStore, Operation, StoreError, StoreResult};
use chartsync_testkit::prelude::*;
use std::sync::Arc;

const CHART: &str = "chart-grid";

fn load(remote: &MockRemote, data: &ClinicData) {
    remote.set_users(data.users.clone());
    remote.set_locations(data.locations.clone());
    if let Some(chart) = &data.chart {
        remote.set_chart(chart.clone());
    }
    remote.set_concepts(data.concepts.clone());
    remote.set_patients(data.patients.clone());
    remote.set_all_encounters(data.encounters.clone());
    remote.set_orders(data.orders.clone());
    remote.set_forms(data.forms.clone());
}

fn engine_with(store: MemoryStore) -> (SyncEngine<MockRemote, MemoryStore>, Arc<StatusLog>) {
    let remote = MockRemote::new();
    load(&remote, &ClinicData::sample(CHART));
    let engine = SyncEngine::new(SyncConfig::new(CHART), remote, store);
    let log = Arc::new(StatusLog::new());
    engine.add_observer(log.clone());
    (engine, log)
}

fn endpoint_order(calls: &[RemoteCall]) -> Vec<RemoteEndpoint> {
    calls.iter().map(RemoteCall::endpoint).collect()
}

const ALL_ENDPOINTS: [RemoteEndpoint; 8] = [
    RemoteEndpoint::Users,
    RemoteEndpoint::Locations,
    RemoteEndpoint::Chart,
    RemoteEndpoint::Concepts,
    RemoteEndpoint::Patients,
    RemoteEndpoint::Encounters,
    RemoteEndpoint::Orders,
    RemoteEndpoint::Forms,
];

// ============================================================================
// Phase selection
// ============================================================================

#[test]
fn full_sync_runs_every_phase_once_in_order() {
    let (engine, log) = engine_with(MemoryStore::new());
    let result = engine.run(&SyncRequest::full());

    assert!(result.is_success(), "{:?}", result.cause);
    assert_eq!(result.phases_run, SyncPhase::ALL.to_vec());
    assert_eq!(endpoint_order(&engine.remote().calls()), ALL_ENDPOINTS.to_vec());
    assert_eq!(log.last(), Some(SyncStatus::Completed));

    let store = engine.store();
    assert_eq!(keys(store, Domain::Users), vec!["doctor", "nurse"]);
    assert_eq!(keys(store, Domain::Locations), vec!["site", "ward"]);
    assert_eq!(
        keys(store, Domain::ChartItems),
        vec![format!("{CHART}/1"), format!("{CHART}/2")]
    );
    assert_eq!(keys(store, Domain::Patients), vec!["p1", "p2"]);
    assert_eq!(keys(store, Domain::Observations), vec!["e1/temperature", "e2/pulse"]);
    assert_eq!(keys(store, Domain::Orders), vec!["o1"]);
    assert_eq!(keys(store, Domain::Forms), vec!["intake"]);
    assert_eq!(engine.watermark().unwrap(), Some(Timestamp::from_millis(10_000)));
}

#[test]
fn empty_phase_set_runs_every_phase() {
    let (engine, _log) = engine_with(MemoryStore::new());
    let result = engine.run(&SyncRequest::new());
    assert_eq!(result.phases_run, SyncPhase::ALL.to_vec());
    assert_eq!(engine.last_full_sync_window().unwrap(), None);
}

#[test]
fn unselected_phases_are_skipped_without_stopping() {
    let (engine, log) = engine_with(MemoryStore::new());
    let request = SyncRequest::phases([SyncPhase::Forms, SyncPhase::Users]);
    let result = engine.run(&request);

    assert!(result.is_success());
    assert_eq!(result.phases_run, vec![SyncPhase::Users, SyncPhase::Forms]);
    assert_eq!(
        engine.remote().calls(),
        vec![RemoteCall::Users, RemoteCall::Forms]
    );
    assert!(log.labels().contains(&"syncing forms".to_string()));
    assert!(keys(engine.store(), Domain::Patients).is_empty());
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn cancel_before_any_phase_mutates_nothing() {
    let seeded = seeded_store(&[user("existing"), temporary_observation("p1", "c1", "1")]);
    let before = seeded.tables();
    let (engine, log) = engine_with(seeded);

    engine.cancel();
    let result = engine.run(&SyncRequest::full());

    assert_eq!(result.outcome, SyncOutcome::Canceled);
    assert!(result.phases_run.is_empty());
    assert!(engine.remote().calls().is_empty());
    assert_eq!(engine.store().tables(), before);
    assert_eq!(log.statuses(), vec![SyncStatus::Started, SyncStatus::Canceled]);
}

#[test]
fn cancel_between_phases_discards_completed_phases() {
    for k in 0..SyncPhase::ALL.len() - 1 {
        let seeded = seeded_store(&[user("existing"), patient("p0")]);
        let before = seeded.tables();
        let (engine, _log) = engine_with(seeded);

        let finished_label = SyncPhase::ALL[k].label();
        let handle = engine.cancel_handle();
        engine.add_observer(Arc::new(move |status: &SyncStatus| {
            if let SyncStatus::InProgress(progress) = status {
                if progress.increment > 0 && progress.label == finished_label {
                    handle.cancel();
                }
            }
        }));

        let result = engine.run(&SyncRequest::full());
        assert_eq!(result.outcome, SyncOutcome::Canceled, "phase {k}");
        assert_eq!(result.phases_run, SyncPhase::ALL[..=k].to_vec());
        let expected = format!("before {}", SyncPhase::ALL[k + 1]);
        assert!(
            matches!(&result.cause, Some(SyncError::Cancelled { when }) if *when == expected),
            "{:?}",
            result.cause
        );
        assert_eq!(engine.store().tables(), before, "phase {k}");
        assert!(engine.store().open_savepoints().is_empty());
    }
}

#[test]
fn cancel_during_a_phase_fetch_is_seen_before_apply() {
    let (engine, _log) = engine_with(MemoryStore::new());
    let handle = engine.cancel_handle();
    engine.remote().on_call(move |call| {
        if *call == RemoteCall::Patients {
            handle.cancel();
        }
    });
    let result = engine.run(&SyncRequest::full());
    assert_eq!(result.outcome, SyncOutcome::Canceled);
    assert_eq!(result.phases_run.last(), Some(&SyncPhase::Patients));
    assert!(keys(engine.store(), Domain::Users).is_empty());
}

#[test]
fn cancel_requested_while_idle_applies_to_next_run_only() {
    let (engine, _log) = engine_with(MemoryStore::new());
    engine.cancel();
    assert_eq!(engine.run(&SyncRequest::new()).outcome, SyncOutcome::Canceled);
    assert_eq!(engine.run(&SyncRequest::new()).outcome, SyncOutcome::Succeeded);
}

// ============================================================================
// Failure and rollback
// ============================================================================

#[test]
fn failing_phase_restores_the_exact_prior_state() {
    let failures = [
        (RemoteEndpoint::Users, MockFailure::Timeout),
        (RemoteEndpoint::Concepts, MockFailure::Malformed),
        (RemoteEndpoint::Encounters, MockFailure::Timeout),
        (RemoteEndpoint::Forms, MockFailure::Server),
    ];
    for (endpoint, failure) in failures {
        let seeded = seeded_store(&[
            user("existing"),
            patient("p1"),
            observation("p1", "old", "temperature", "37"),
            temporary_observation("p1", "pulse", "80"),
        ]);
        let before = seeded.tables();
        let (engine, log) = engine_with(seeded);
        engine.remote().fail(endpoint, failure);

        let result = engine.run(&SyncRequest::full());
        assert_eq!(result.outcome, SyncOutcome::Failed, "{endpoint:?}");
        assert_eq!(result.stats.io_errors, 1);
        assert_eq!(engine.store().tables(), before, "{endpoint:?}");
        assert_eq!(engine.last_full_sync_window().unwrap(), None);
        assert_eq!(log.last(), Some(SyncStatus::Failed));
    }
}

#[test]
fn unavailable_remote_fails_immediately() {
    let (engine, log) = engine_with(MemoryStore::new());
    let health = Arc::new(HealthState::new());
    health.mark_unavailable();
    let engine = engine.with_health(health);

    let result = engine.run(&SyncRequest::phases(Vec::<SyncPhase>::new()));
    assert_eq!(result.outcome, SyncOutcome::Failed);
    assert!(result.phases_run.is_empty());
    assert!(engine.remote().calls().is_empty());
    assert_eq!(log.statuses(), vec![SyncStatus::Failed]);
    assert!(engine.store().open_savepoints().is_empty());
}

#[test]
fn file_store_keeps_nothing_from_a_failed_run() {
    let test_store = TestFileStore::new();
    let path = test_store.dir.path().to_path_buf();
    {
        let store = &test_store.store;
        seed(store, &[user("existing")]);
    }
    let remote = MockRemote::new();
    load(&remote, &ClinicData::sample(CHART));
    remote.fail(RemoteEndpoint::Orders, MockFailure::Transport);

    let TestFileStore { store, dir } = test_store;
    let engine = SyncEngine::new(SyncConfig::new(CHART), remote, store);
    assert!(!engine.run(&SyncRequest::full()).is_success());
    drop(engine);

    let reopened = chartsync_store::FileStore::open(&path).unwrap();
    assert_eq!(keys(&reopened, Domain::Users), vec!["existing"]);
    assert_eq!(reopened.count(Domain::Patients, &Filter::All).unwrap(), 0);
    drop(dir);
}

/// A memory store that cannot commit its outermost savepoint.
struct CommitFails(MemoryStore);

impl LocalStore for CommitFails {
    fn query(&self, domain: Domain, filter: &Filter) -> StoreResult<Vec<Record>> {
        self.0.query(domain, filter)
    }

    fn bulk_insert(&self, domain: Domain, records: Vec<Record>) -> StoreResult<usize> {
        self.0.bulk_insert(domain, records)
    }

    fn delete(&self, domain: Domain, filter: &Filter) -> StoreResult<usize> {
        self.0.delete(domain, filter)
    }

    fn apply_batch(&self, operations: Vec<Operation>) -> StoreResult<usize> {
        self.0.apply_batch(operations)
    }

    fn begin_savepoint(&self, name: &str) -> StoreResult<()> {
        self.0.begin_savepoint(name)
    }

    fn rollback_savepoint(&self, name: &str) -> StoreResult<()> {
        self.0.rollback_savepoint(name)
    }

    fn release_savepoint(&self, _name: &str) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

#[test]
fn commit_failure_restores_the_exact_prior_state() {
    let store = CommitFails(seeded_store(&[user("existing"), patient("p9")]));
    let before = store.0.tables();
    let remote = MockRemote::new();
    load(&remote, &ClinicData::sample(CHART));
    let engine = SyncEngine::new(SyncConfig::new(CHART), remote, store);
    let log = Arc::new(StatusLog::new());
    engine.add_observer(log.clone());

    let result = engine.run(&SyncRequest::full());

    assert_eq!(result.outcome, SyncOutcome::Failed);
    assert_eq!(result.phases_run, SyncPhase::ALL.to_vec());
    assert_eq!(result.stats.database_errors, 1);
    assert!(matches!(result.cause, Some(SyncError::Store(StoreError::Io(_)))));
    assert_eq!(log.last(), Some(SyncStatus::Failed));
    assert_eq!(engine.store().0.tables(), before);
    assert!(engine.store().0.open_savepoints().is_empty());
    assert_eq!(engine.watermark().unwrap(), None);
}

#[test]
fn file_store_snapshot_failure_discards_the_run() {
    let TestFileStore { store, dir } = TestFileStore::new();
    seed(&store, &[user("existing")]);
    let before = store.tables();
    // A directory in place of the snapshot temp file makes the final write fail.
    let blocker = dir.path().join("CACHE.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let remote = MockRemote::new();
    load(&remote, &ClinicData::sample(CHART));
    let engine = SyncEngine::new(SyncConfig::new(CHART), remote, store);
    let result = engine.run(&SyncRequest::full());

    assert_eq!(result.outcome, SyncOutcome::Failed);
    assert_eq!(result.stats.database_errors, 1);
    assert_eq!(engine.store().tables(), before);
    drop(engine);

    std::fs::remove_dir(&blocker).unwrap();
    let reopened = chartsync_store::FileStore::open(dir.path()).unwrap();
    assert_eq!(keys(&reopened, Domain::Users), vec!["existing"]);
    assert_eq!(reopened.count(Domain::Patients, &Filter::All).unwrap(), 0);
}

// ============================================================================
// Observations
// ============================================================================

#[test]
fn incremental_run_never_fetches_everything() {
    let seeded = seeded_store(&[patient("p1")]);
    let (engine, _log) = engine_with(seeded);
    engine.run(&SyncRequest::phases([SyncPhase::Observations]));
    engine.remote().clear_calls();

    let t0 = engine.watermark().unwrap().unwrap();
    let result = engine.run(
        &SyncRequest::phases([SyncPhase::Observations]).with_incremental_observations(),
    );
    assert!(result.is_success());
    assert_eq!(engine.remote().calls(), vec![RemoteCall::EncountersSince(t0)]);
}

#[test]
fn incremental_run_without_snapshot_keeps_watermark() {
    let seeded = seeded_store(&[patient("p1")]);
    let (engine, _log) = engine_with(seeded);
    engine.run(&SyncRequest::phases([SyncPhase::Observations]));
    let t0 = engine.watermark().unwrap();

    engine
        .remote()
        .set_encounters_since(encounters(vec![], None));
    engine.run(&SyncRequest::phases([SyncPhase::Observations]).with_incremental_observations());
    assert_eq!(engine.watermark().unwrap(), t0);
}

#[test]
fn incremental_run_adds_new_observations_and_advances_watermark() {
    let t0 = 10_000;
    let t1 = 12_000;
    let t2 = 15_000;
    let seeded = seeded_store(&[patient("p")]);
    let (engine, _log) = engine_with(seeded);
    engine.run(&SyncRequest::phases([SyncPhase::Observations]));
    assert_eq!(engine.watermark().unwrap(), Some(Timestamp::from_millis(t0)));

    engine.remote().set_encounters_since(encounters(
        vec![patient_record(Some("p"), "e-new", t1, &[("temperature", "39"), ("pulse", "110")])],
        Some(t2),
    ));
    let result = engine.run(
        &SyncRequest::phases([SyncPhase::Observations]).with_incremental_observations(),
    );
    assert!(result.is_success());

    let stored = engine
        .store()
        .query(Domain::Observations, &Filter::patients(["p"]))
        .unwrap();
    let new_keys: Vec<_> = stored
        .iter()
        .map(|r| r.key())
        .filter(|k| k.starts_with("e-new/"))
        .collect();
    assert_eq!(new_keys, vec!["e-new/pulse", "e-new/temperature"]);
    assert_eq!(engine.watermark().unwrap(), Some(Timestamp::from_millis(t2)));
}

#[test]
fn full_run_replaces_a_patients_observations() {
    let seeded = seeded_store(&[
        patient("p"),
        observation("p", "enc", "a", "1"),
        observation("p", "enc", "b", "2"),
    ]);
    let (engine, _log) = engine_with(seeded);
    engine.remote().set_all_encounters(encounters(
        vec![patient_record(Some("p"), "enc2", 3_000, &[("c", "3")])],
        Some(4_000),
    ));
    engine.run(&SyncRequest::phases([SyncPhase::Observations]));

    let stored = engine
        .store()
        .query(Domain::Observations, &Filter::patients(["p"]))
        .unwrap();
    let keys: Vec<_> = stored.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["enc2/c"]);
}

#[test]
fn no_temporary_observations_survive_a_successful_run() {
    let seeded = seeded_store(&[
        patient("p1"),
        temporary_observation("p1", "temperature", "38"),
        temporary_observation("p9", "pulse", "70"),
    ]);
    let (engine, _log) = engine_with(seeded);
    assert!(engine.run(&SyncRequest::full()).is_success());
    assert_eq!(
        engine
            .store()
            .count(Domain::Observations, &Filter::Temporary)
            .unwrap(),
        0
    );
}

#[test]
fn observation_fetch_uses_its_own_timeout() {
    let (engine, _log) = engine_with(seeded_store(&[patient("p1")]));
    engine.run(&SyncRequest::full());
    let records = engine.remote().call_records();
    let default = engine.config().timeouts.default;
    let observations = engine.config().timeouts.observations;
    for record in records {
        let expected = if record.call.endpoint() == RemoteEndpoint::Encounters {
            observations
        } else {
            default
        };
        assert_eq!(record.timeout, expected, "{:?}", record.call);
    }
}

// ============================================================================
// Status and bookkeeping
// ============================================================================

#[test]
fn status_sequence_of_a_successful_run() {
    let (engine, log) = engine_with(MemoryStore::new());
    engine.run(&SyncRequest::phases([SyncPhase::Users]));
    let statuses = log.statuses();
    assert_eq!(statuses.first(), Some(&SyncStatus::Started));
    assert_eq!(statuses.last(), Some(&SyncStatus::Completed));
    assert_eq!(
        log.labels(),
        vec!["sync in progress", "syncing users", "syncing users", "completing sync"]
    );
}

#[test]
fn full_sync_window_is_recorded_only_on_success() {
    let (engine, _log) = engine_with(MemoryStore::new());
    engine.remote().fail(RemoteEndpoint::Forms, MockFailure::Transport);
    engine.run(&SyncRequest::full());
    assert_eq!(engine.last_full_sync_window().unwrap(), None);

    engine.remote().clear_failures();
    engine.run(&SyncRequest::full());
    let window = engine.last_full_sync_window().unwrap().unwrap();
    assert!(window.end >= window.start);
}

#[test]
fn concept_cache_reflects_synced_concepts() {
    let (engine, _log) = engine_with(MemoryStore::new());
    engine.run(&SyncRequest::phases([SyncPhase::Concepts]));
    let snapshot = engine
        .concept_cache()
        .load(engine.store(), "en")
        .unwrap();
    assert_eq!(snapshot.name("temperature"), Some("temperature"));
}
