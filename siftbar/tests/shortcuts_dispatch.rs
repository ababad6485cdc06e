mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockQueryService, RecordingNotifier, RecordingReload, row};
use serial_test::serial;
use siftbar::{FilterBar, Key, catalog, shortcuts};

fn collaborators() -> (Arc<MockQueryService>, Arc<RecordingReload>, Arc<RecordingNotifier>) {
    (
        Arc::new(MockQueryService::new()),
        Arc::new(RecordingReload::new()),
        Arc::new(RecordingNotifier::new()),
    )
}

#[tokio::test]
#[serial]
async fn enter_routes_only_to_the_focused_bar() {
    shortcuts::clear_focus();
    let (service_a, reload_a, notifier_a) = collaborators();
    let (service_b, reload_b, notifier_b) = collaborators();
    let bar_a = FilterBar::mount(catalog::sales_bar(), service_a, reload_a.clone(), notifier_a).unwrap();
    let bar_b = FilterBar::mount(catalog::invoices_bar(), service_b, reload_b.clone(), notifier_b).unwrap();

    bar_a.set_value("number", "SO/1").unwrap();
    bar_a.focus_field("number").unwrap();

    assert!(shortcuts::dispatch(Key::Enter).await);
    assert_eq!(reload_a.call_count(), 1);
    assert_eq!(reload_b.call_count(), 0);

    bar_a.unmount();
    bar_b.unmount();
}

#[tokio::test]
#[serial]
async fn foreign_focus_blocks_global_shortcuts() {
    shortcuts::clear_focus();
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    shortcuts::focus_foreign();
    assert!(!shortcuts::dispatch(Key::Enter).await);
    assert_eq!(reload.call_count(), 0);

    bar.unmount();
    shortcuts::clear_focus();
}

#[tokio::test]
#[serial]
async fn unfocused_enter_goes_to_the_most_recent_global_bar() {
    shortcuts::clear_focus();
    let (service_scoped, reload_scoped, notifier_scoped) = collaborators();
    let (service_global, reload_global, notifier_global) = collaborators();
    // purchases is Scoped, sales is Global.
    let scoped = FilterBar::mount(catalog::purchases_bar(), service_scoped, reload_scoped.clone(), notifier_scoped)
        .unwrap();
    let global =
        FilterBar::mount(catalog::sales_bar(), service_global, reload_global.clone(), notifier_global).unwrap();

    assert!(shortcuts::dispatch(Key::Enter).await);
    assert_eq!(reload_global.call_count(), 1);
    assert_eq!(reload_scoped.call_count(), 0);

    scoped.unmount();
    global.unmount();
}

#[tokio::test]
#[serial]
async fn unmounted_bars_no_longer_receive_keys() {
    shortcuts::clear_focus();
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.focus_field("number").unwrap();
    bar.unmount();

    assert!(!shortcuts::dispatch(Key::Enter).await);
    assert_eq!(reload.call_count(), 0);
}

#[tokio::test(start_paused = true)]
#[serial]
async fn enter_prefers_an_open_suggestion_over_submitting() {
    shortcuts::clear_focus();
    let (service, reload, notifier) = collaborators();
    service.add_rows(
        "partner",
        vec![row(&[
            ("id", serde_json::json!(7)),
            ("name", serde_json::json!("Acme Industries")),
            ("ref", serde_json::json!("ACM")),
        ])],
    );
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.input("customer", "acm").unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    bar.handle_key(Key::ArrowDown).await;
    bar.handle_key(Key::Enter).await;

    // The highlighted candidate was selected; nothing was submitted yet.
    assert_eq!(bar.resolved_id("customer").unwrap(), Some(7));
    assert_eq!(reload.call_count(), 0);

    // With the surface closed, Enter now submits the bar.
    bar.handle_key(Key::Enter).await;
    assert_eq!(reload.call_count(), 1);

    bar.unmount();
}

#[tokio::test]
#[serial]
async fn escape_clears_only_when_the_schema_opts_in() {
    shortcuts::clear_focus();
    let (service_inv, reload_inv, notifier_inv) = collaborators();
    let invoices = FilterBar::mount(catalog::invoices_bar(), service_inv, reload_inv.clone(), notifier_inv).unwrap();
    invoices.set_value("number", "X7").unwrap();
    invoices.handle_key(Key::Escape).await;
    // Escape-to-clear submits the empty expression and resets the field.
    assert_eq!(reload_inv.call_count(), 1);
    assert!(reload_inv.last().unwrap().is_empty());
    assert_eq!(invoices.value("number").unwrap(), None);
    invoices.unmount();

    let (service_sales, reload_sales, notifier_sales) = collaborators();
    let sales = FilterBar::mount(catalog::sales_bar(), service_sales, reload_sales.clone(), notifier_sales).unwrap();
    sales.set_value("number", "SO/1").unwrap();
    sales.handle_key(Key::Escape).await;
    assert_eq!(reload_sales.call_count(), 0);
    assert_eq!(sales.value("number").unwrap().as_deref(), Some("SO/1"));
    sales.unmount();
}
