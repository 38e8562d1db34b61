//! Property tests for whole sync runs.

use chartsync_engine::{
    MockFailure, MockRemote, RemoteCall, RemoteEndpoint, SyncConfig, SyncEngine, SyncOutcome,
    SyncPhase, SyncRequest,
};
use chartsync_model::Domain;
use chartsync_store::{Filter, LocalStore};
use chartsync_testkit::prelude::*;
use proptest::prelude::*;

fn endpoint_for(phase: SyncPhase) -> RemoteEndpoint {
    match phase {
        SyncPhase::Users => RemoteEndpoint::Users,
        SyncPhase::Locations => RemoteEndpoint::Locations,
        SyncPhase::ChartItems => RemoteEndpoint::Chart,
        SyncPhase::Concepts => RemoteEndpoint::Concepts,
        SyncPhase::Patients => RemoteEndpoint::Patients,
        SyncPhase::Observations => RemoteEndpoint::Encounters,
        SyncPhase::Orders => RemoteEndpoint::Orders,
        SyncPhase::Forms => RemoteEndpoint::Forms,
    }
}

fn remote_for(data: &ClinicData) -> MockRemote {
    let remote = MockRemote::new();
    remote.set_users(data.users.clone());
    remote.set_patients(data.patients.clone());
    remote.set_all_encounters(data.encounters.clone());
    remote.set_orders(data.orders.clone());
    remote.set_forms(data.forms.clone());
    remote
}

fn phase_subset() -> impl Strategy<Value = Vec<SyncPhase>> {
    prop::sample::subsequence(SyncPhase::ALL.to_vec(), 0..=SyncPhase::ALL.len())
        .prop_shuffle()
}

fn failure_strategy() -> impl Strategy<Value = MockFailure> {
    prop_oneof![
        Just(MockFailure::Timeout),
        Just(MockFailure::Transport),
        Just(MockFailure::Malformed),
        Just(MockFailure::Server),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn phases_always_run_in_fixed_order(phases in phase_subset()) {
        let engine = SyncEngine::new(SyncConfig::default(), MockRemote::new(), seeded_store(&[]));
        let result = engine.run(&SyncRequest::phases(phases.clone()));
        prop_assert!(result.is_success());

        let mut expected = if phases.is_empty() { SyncPhase::ALL.to_vec() } else { phases };
        expected.sort();
        prop_assert_eq!(result.phases_run, expected);
    }

    #[test]
    fn any_failing_phase_leaves_store_unchanged(
        local in local_records_strategy(),
        data in clinic_data_strategy(),
        failing in prop::sample::select(SyncPhase::ALL.to_vec()),
        failure in failure_strategy(),
    ) {
        let store = seeded_store(&local);
        let before = store.tables();
        let remote = remote_for(&data);
        remote.fail(endpoint_for(failing), failure);

        let engine = SyncEngine::new(SyncConfig::default(), remote, store);
        let result = engine.run(&SyncRequest::full());

        // The observation phase never fetches when no patients are known.
        let fetched = engine
            .remote()
            .calls()
            .iter()
            .any(|call| call.endpoint() == endpoint_for(failing));
        if fetched {
            prop_assert_eq!(result.outcome, SyncOutcome::Failed);
            prop_assert_eq!(engine.store().tables(), before);
        } else {
            prop_assert!(result.is_success());
        }
        prop_assert!(engine.store().open_savepoints().is_empty());
    }

    #[test]
    fn successful_runs_leave_no_temporary_observations(
        local in local_records_strategy(),
        data in clinic_data_strategy(),
    ) {
        let engine = SyncEngine::new(SyncConfig::default(), remote_for(&data), seeded_store(&local));
        let result = engine.run(&SyncRequest::full());
        prop_assert!(result.is_success());
        prop_assert_eq!(
            engine.store().count(Domain::Observations, &Filter::Temporary).unwrap(),
            0
        );
    }

    #[test]
    fn full_domains_match_the_server_after_success(
        local in local_records_strategy(),
        data in clinic_data_strategy(),
    ) {
        let engine = SyncEngine::new(SyncConfig::default(), remote_for(&data), seeded_store(&local));
        prop_assert!(engine.run(&SyncRequest::full()).is_success());

        let users: Vec<String> = data.users.iter().filter_map(|u| u.uuid.clone()).collect();
        prop_assert_eq!(keys(engine.store(), Domain::Users), users);
        let forms: Vec<String> = data.forms.iter().filter_map(|f| f.uuid.clone()).collect();
        prop_assert_eq!(keys(engine.store(), Domain::Forms), forms);
    }

    #[test]
    fn incremental_runs_with_a_watermark_never_fetch_everything(
        data in clinic_data_strategy(),
        since in encounter_response_strategy(),
    ) {
        let engine = SyncEngine::new(
            SyncConfig::default(),
            remote_for(&data),
            seeded_store(&[patient("p0")]),
        );
        engine.remote().set_all_encounters(encounters(vec![], Some(50_000)));
        engine.run(&SyncRequest::phases([SyncPhase::Observations]));
        let watermark = engine.watermark().unwrap();
        prop_assert!(watermark.is_some());

        engine.remote().clear_calls();
        engine.remote().set_encounters_since(since.clone());
        let request = SyncRequest::phases([SyncPhase::Observations]).with_incremental_observations();
        prop_assert!(engine.run(&request).is_success());
        prop_assert!(!engine.remote().calls().contains(&RemoteCall::AllEncounters));

        let expected = since.snapshot_time.or(watermark);
        prop_assert_eq!(engine.watermark().unwrap(), expected);
    }
}
