// Catalog switch/delete/poll behavior and its effect on schema and session.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{activated, test_config, StubBackend};
use pretty_assertions::assert_eq;
use text2sql_core::error::{ClientError, Operation, ValidationError};
use text2sql_core::{AppEvent, Backend, Orchestrator};
use text2sql_types::{ClientEvent, Phase};

// ============================================================================
// Switching
// ============================================================================

#[tokio::test]
async fn round_trip_switch_refetches_schema_twice() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;
    let baseline = stub.calls(Operation::ActiveSchema);
    assert_eq!(baseline, 1);

    app.dispatch(AppEvent::SwitchSource("sales_data".into()))
        .unwrap();
    app.settle().await;
    assert_eq!(
        app.schema().schema().unwrap().first_table(),
        Some("sales_data")
    );

    app.dispatch(AppEvent::SwitchSource("default".into()))
        .unwrap();
    app.settle().await;

    assert_eq!(stub.calls(Operation::ActiveSchema), baseline + 2);
    assert_eq!(stub.switches(), vec!["sales_data", "default"]);
    let view = app.schema().view();
    assert_eq!(view.schema.as_ref().unwrap().first_table(), Some("products"));
    assert_eq!(view.default_expanded.as_deref(), Some("products"));
    assert_eq!(app.catalog().active(), "default");
}

#[tokio::test]
async fn switch_clears_generated_query_and_result() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;

    app.dispatch(AppEvent::Ask("Top 5 most expensive products".into()))
        .unwrap();
    app.settle().await;
    app.dispatch(AppEvent::ExecuteGenerated).unwrap();
    app.settle().await;
    assert_eq!(app.session().phase(), Phase::Executed);

    app.perform(AppEvent::SwitchSource("sales_data".into()))
        .await
        .unwrap();

    let session = app.session().session();
    assert_eq!(session.phase, Phase::Idle);
    assert_eq!(session.sql, None);
    assert_eq!(session.explanation, None);
    assert_eq!(session.result, None);
    assert_eq!(session.question, "Top 5 most expensive products");
}

#[tokio::test]
async fn switch_during_generation_discards_late_result() {
    let stub = StubBackend::with_uploaded("sales_data");
    let gate = stub.hold(Operation::GenerateQuery);
    let mut app = activated(&stub).await;

    app.dispatch(AppEvent::Ask("Top 5 most expensive products".into()))
        .unwrap();
    app.dispatch(AppEvent::SwitchSource("sales_data".into()))
        .unwrap();
    assert_eq!(app.session().phase(), Phase::Generating);

    // The switch lands while generation is still parked.
    app.settle().await;
    assert_eq!(app.session().phase(), Phase::Idle);
    assert_eq!(app.catalog().active(), "sales_data");

    gate.notify_one();
    common::wait_until(|| stub.calls(Operation::GenerateQuery) == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    app.perform(AppEvent::RefreshCatalog).await.unwrap();

    assert_eq!(app.session().phase(), Phase::Idle);
    assert_eq!(app.session().session().sql, None);
}

#[tokio::test]
async fn failed_switch_keeps_active_and_surfaces_error() {
    let stub = StubBackend::new();
    let mut app = activated(&stub).await;
    let mut events = app.subscribe();
    let fetches = stub.calls(Operation::ActiveSchema);

    // Nothing is known to be wrong until the backend answers.
    app.dispatch(AppEvent::SwitchSource("ghost".into())).unwrap();
    assert!(events.try_recv().is_err());

    app.settle().await;
    assert_eq!(app.catalog().active(), "default");
    assert_eq!(stub.calls(Operation::ActiveSchema), fetches);
    match events.try_recv().unwrap() {
        ClientEvent::Error { operation, message } => {
            assert_eq!(operation, "switch_source");
            assert_eq!(message, "Database not found");
        }
        other => panic!("unexpected event {other:?}"),
    }

    let err = app
        .perform(AppEvent::SwitchSource("ghost".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Request(_)));
    assert_eq!(err.user_message(), "Database not found");
    assert_eq!(app.catalog().active(), "default");
}

#[tokio::test]
async fn second_switch_while_one_is_out_is_ignored() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;
    let gate = stub.hold(Operation::SwitchSource);

    app.dispatch(AppEvent::SwitchSource("sales_data".into()))
        .unwrap();
    app.dispatch(AppEvent::SwitchSource("default".into())).unwrap();
    common::wait_until(|| stub.calls(Operation::SwitchSource) == 1).await;

    gate.notify_one();
    app.settle().await;

    assert_eq!(stub.calls(Operation::SwitchSource), 1);
    assert_eq!(stub.switches(), vec!["sales_data"]);
    assert_eq!(app.catalog().active(), "sales_data");
}

// ============================================================================
// Deleting
// ============================================================================

#[tokio::test]
async fn built_in_delete_rejected_before_network() {
    let stub = StubBackend::new();
    let mut app = activated(&stub).await;

    let err = app
        .dispatch(AppEvent::RequestDelete("default".into()))
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::BuiltInSource { .. })
    ));

    let err = app
        .dispatch(AppEvent::ConfirmDelete("default".into()))
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::DeleteNotConfirmed { .. })
    ));

    assert_eq!(stub.calls(Operation::DeleteSource), 0);
}

#[tokio::test]
async fn delete_requires_confirmation_then_relists() {
    let stub = StubBackend::with_uploaded("q3_sales_data");
    let mut app = activated(&stub).await;
    let mut events = app.subscribe();
    let listings = stub.calls(Operation::ListSources);

    app.dispatch(AppEvent::RequestDelete("q3_sales_data".into()))
        .unwrap();
    assert_eq!(stub.calls(Operation::DeleteSource), 0);
    match events.try_recv().unwrap() {
        ClientEvent::DeletePrompt { name, prompt } => {
            assert_eq!(name, "q3_sales_data");
            assert_eq!(prompt, "Delete \"q3 sales data\"? This cannot be undone.");
        }
        other => panic!("unexpected event {other:?}"),
    }

    app.perform(AppEvent::ConfirmDelete("q3_sales_data".into()))
        .await
        .unwrap();
    assert_eq!(stub.calls(Operation::DeleteSource), 1);
    assert_eq!(stub.calls(Operation::ListSources), listings + 1);
    assert!(app.catalog().get("q3_sales_data").is_none());
    assert!(app.pending_delete().is_none());
}

#[tokio::test]
async fn cancelled_delete_issues_no_call() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;

    app.dispatch(AppEvent::RequestDelete("sales_data".into()))
        .unwrap();
    app.dispatch(AppEvent::CancelDelete).unwrap();
    assert!(app
        .dispatch(AppEvent::ConfirmDelete("sales_data".into()))
        .is_err());
    assert_eq!(stub.calls(Operation::DeleteSource), 0);
    assert!(app.catalog().get("sales_data").is_some());
}

#[tokio::test]
async fn deleting_active_source_follows_backend_choice() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;
    app.dispatch(AppEvent::SwitchSource("sales_data".into()))
        .unwrap();
    app.settle().await;
    let fetches = stub.calls(Operation::ActiveSchema);

    app.dispatch(AppEvent::RequestDelete("sales_data".into()))
        .unwrap();
    app.dispatch(AppEvent::ConfirmDelete("sales_data".into()))
        .unwrap();
    app.settle().await;

    // The stub falls back to the built-in source; the client learns this
    // from the re-list rather than assuming it.
    assert_eq!(app.catalog().active(), stub.active());
    assert_eq!(app.catalog().active(), "default");
    assert_eq!(stub.calls(Operation::ActiveSchema), fetches + 1);
    assert_eq!(app.schema().schema().unwrap().first_table(), Some("products"));
}

#[tokio::test]
async fn backend_delete_error_keeps_entry() {
    let stub = StubBackend::with_uploaded("sales_data");
    stub.fail(Operation::DeleteSource, 500, None);
    let mut app = activated(&stub).await;

    app.dispatch(AppEvent::RequestDelete("sales_data".into()))
        .unwrap();
    let err = app
        .perform(AppEvent::ConfirmDelete("sales_data".into()))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Failed to delete database");
    assert!(app.catalog().get("sales_data").is_some());
}

// ============================================================================
// Listing and polling
// ============================================================================

#[tokio::test]
async fn listing_failure_keeps_previous_catalog() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;
    let before = app.catalog().snapshot();
    assert_eq!(before.sources.len(), 2);

    stub.fail(Operation::ListSources, 503, None);
    app.perform(AppEvent::RefreshCatalog).await.unwrap();

    assert_eq!(app.catalog().snapshot(), before);
}

#[tokio::test]
async fn backend_side_switch_resets_session_and_refetches() {
    let stub = StubBackend::with_uploaded("sales_data");
    let mut app = activated(&stub).await;
    app.dispatch(AppEvent::ExecuteQuery("SELECT 1".into()))
        .unwrap();
    app.settle().await;
    let fetches = stub.calls(Operation::ActiveSchema);

    stub.set_active("sales_data");
    app.dispatch(AppEvent::RefreshCatalog).unwrap();
    app.settle().await;

    assert_eq!(app.catalog().active(), "sales_data");
    assert_eq!(app.catalog().active_label(), "sales data");
    assert_eq!(app.session().phase(), Phase::Idle);
    assert_eq!(app.session().session().result, None);
    assert_eq!(stub.calls(Operation::ActiveSchema), fetches + 1);
}

#[tokio::test]
async fn run_loop_polls_and_handles_events() {
    let stub = StubBackend::with_uploaded("sales_data");
    let backend: Arc<dyn Backend> = stub.clone();
    let mut config = test_config();
    config.poll_interval = Duration::from_millis(20);
    let app = Orchestrator::new(backend, &config);
    let mut events = app.subscribe();

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let handle = tokio::spawn(app.run(rx));

    tx.send(AppEvent::SwitchSource("sales_data".into()))
        .await
        .unwrap();

    let switched = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(ClientEvent::CatalogChanged { catalog }) = events.recv().await {
                if catalog.active == "sales_data" {
                    return catalog;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(switched.active_label, "sales data");

    common::wait_until(|| stub.calls(Operation::ListSources) >= 3).await;

    tx.send(AppEvent::Shutdown).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn run_loop_stops_when_senders_drop() {
    let stub = StubBackend::new();
    let backend: Arc<dyn Backend> = stub.clone();
    let app = Orchestrator::new(backend, &test_config());
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let handle = tokio::spawn(app.run(rx));
    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}
