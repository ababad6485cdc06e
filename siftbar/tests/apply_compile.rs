mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{MockQueryService, RecordingNotifier, RecordingReload, row};
use siftbar::{
    BarError, CompareOp, FilterBar, FilterExpression, Predicate, Severity, Value, catalog,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn collaborators() -> (Arc<MockQueryService>, Arc<RecordingReload>, Arc<RecordingNotifier>) {
    (
        Arc::new(MockQueryService::new()),
        Arc::new(RecordingReload::new()),
        Arc::new(RecordingNotifier::new()),
    )
}

#[tokio::test]
async fn clear_submits_the_empty_expression() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("number", "SO/42").unwrap();
    bar.set_value("from", "2024-06-01").unwrap();
    bar.clear().await;

    assert_eq!(reload.call_count(), 1);
    assert!(reload.last().unwrap().is_empty());
    bar.unmount();
}

#[tokio::test]
async fn apply_after_clear_is_still_unrestricted() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("amount", "99.5").unwrap();
    bar.clear().await;
    bar.apply().await.unwrap();

    assert_eq!(reload.call_count(), 2);
    assert!(reload.last().unwrap().is_empty());
    bar.unmount();
}

#[tokio::test]
async fn pristine_date_defaults_are_displayed_but_never_compiled() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::purchases_bar(), service, reload.clone(), notifier).unwrap();

    // The default range is prefilled for display...
    assert!(bar.value("from").unwrap().is_some());
    assert!(bar.value("to").unwrap().is_some());

    // ...but an untouched bar still submits no restriction.
    bar.apply().await.unwrap();
    assert!(reload.last().unwrap().is_empty());
    bar.unmount();
}

#[tokio::test]
async fn non_numeric_amount_is_treated_as_absent() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("amount", "abc").unwrap();
    bar.apply().await.unwrap();

    assert!(reload.last().unwrap().is_empty());
    bar.unmount();
}

#[tokio::test]
async fn date_required_bar_short_circuits_on_missing_bound() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::purchases_bar(), service, reload.clone(), notifier.clone()).unwrap();

    bar.set_value("from", "2024-01-01").unwrap();
    let err = bar.apply().await;

    assert!(matches!(err, Err(BarError::Validation(_))));
    assert_eq!(reload.call_count(), 0);
    assert!(notifier.has_error());
    bar.unmount();
}

#[tokio::test]
async fn date_optional_bar_emits_single_lower_bound() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("from", "2024-06-01").unwrap();
    bar.apply().await.unwrap();

    let expected =
        FilterExpression::empty().with(Predicate::new("order_date", CompareOp::Ge, Value::Date(date(2024, 6, 1))));
    assert_eq!(reload.last().unwrap(), expected);
    bar.unmount();
}

#[tokio::test]
async fn inverted_date_range_is_a_validation_error() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier.clone()).unwrap();

    bar.set_value("from", "2024-07-01").unwrap();
    bar.set_value("to", "2024-06-01").unwrap();
    let err = bar.apply().await;

    assert!(matches!(err, Err(BarError::Validation(_))));
    assert_eq!(reload.call_count(), 0);
    assert!(notifier.has_error());
    bar.unmount();
}

#[tokio::test]
async fn malformed_dates_are_recovered_locally_on_open_bars() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("from", "first of June").unwrap();
    bar.apply().await.unwrap();

    assert!(reload.last().unwrap().is_empty());
    bar.unmount();
}

#[tokio::test]
async fn resolved_reference_compiles_to_exactly_one_id_equality() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    let candidate = siftbar::ReferenceCandidate::new(7, "Acme Industries");
    bar.select_candidate("customer", &candidate).unwrap();
    bar.apply().await.unwrap();

    let expr = reload.last().unwrap();
    let expected = FilterExpression::empty().with(Predicate::id_eq("partner_id", 7));
    assert_eq!(expr, expected);
    assert!(!expr.predicates().any(|p| p.op == CompareOp::ContainsCi));
    bar.unmount();
}

#[tokio::test]
async fn unresolved_reference_falls_back_to_label_substring() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("customer", "Acme").unwrap();
    bar.apply().await.unwrap();

    let expr = reload.last().unwrap();
    let expected = FilterExpression::empty().with(Predicate::contains_ci("partner_name", "Acme"));
    assert_eq!(expr, expected);
    assert!(!expr.predicates().any(|p| matches!(p.value, Value::Int(_))));
    bar.unmount();
}

#[tokio::test]
async fn typing_after_selection_discards_the_resolution() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.select_candidate("customer", &siftbar::ReferenceCandidate::new(7, "Acme Industries"))
        .unwrap();
    bar.set_value("customer", "Acme Indu").unwrap();
    assert_eq!(bar.resolved_id("customer").unwrap(), None);

    bar.apply().await.unwrap();
    let expected = FilterExpression::empty().with(Predicate::contains_ci("partner_name", "Acme Indu"));
    assert_eq!(reload.last().unwrap(), expected);
    bar.unmount();
}

#[tokio::test]
async fn cross_entity_lookup_collects_deduplicated_ids() {
    let (service, reload, notifier) = collaborators();
    service.add_rows(
        "shipment",
        vec![
            row(&[("order_id", serde_json::json!(11))]),
            row(&[("order_id", serde_json::json!(4))]),
            row(&[("order_id", serde_json::json!(11))]),
        ],
    );
    let bar = FilterBar::mount(catalog::sales_bar(), service.clone(), reload.clone(), notifier).unwrap();

    bar.set_value("tracking", "PKG-9").unwrap();
    bar.apply().await.unwrap();

    let expected = FilterExpression::empty().with(Predicate::id_in("id", vec![4, 11]));
    assert_eq!(reload.last().unwrap(), expected);

    let lookups = service.calls();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].entity, "shipment");
    assert_eq!(lookups[0].projection, vec!["order_id".to_string()]);
    bar.unmount();
}

#[tokio::test]
async fn cross_entity_zero_matches_excludes_all_rows() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("tracking", "NO-SUCH-PKG").unwrap();
    bar.apply().await.unwrap();

    let expected = FilterExpression::empty().with(Predicate::match_nothing("id"));
    assert_eq!(reload.last().unwrap(), expected);
    bar.unmount();
}

#[tokio::test]
async fn cross_entity_failure_aborts_the_whole_apply() {
    let (service, reload, notifier) = collaborators();
    service.fail_entity("shipment");
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier.clone()).unwrap();

    bar.set_value("number", "SO/1").unwrap();
    bar.set_value("tracking", "PKG-1").unwrap();
    let err = bar.apply().await;

    assert!(matches!(err, Err(BarError::Lookup { entity, .. }) if entity == "shipment"));
    // No partial filter may reach the list view.
    assert_eq!(reload.call_count(), 0);
    let notes = notifier.notes();
    assert!(notes.iter().any(|n| n.severity == Severity::Error && n.body.contains("shipment")));
    bar.unmount();
}

#[tokio::test]
async fn reload_failure_is_logged_and_field_state_survives() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier.clone()).unwrap();

    reload.fail_next();
    bar.set_value("number", "SO/99").unwrap();
    bar.apply().await.unwrap();

    assert_eq!(bar.value("number").unwrap().as_deref(), Some("SO/99"));
    assert!(!notifier.has_error());
    bar.unmount();
}

#[tokio::test]
async fn enum_tag_compiles_exact_match_and_unknown_tags_are_skipped() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::purchases_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("state", "confirmed").unwrap();
    bar.apply().await.unwrap();
    let expected = FilterExpression::empty().with(Predicate::new("state", CompareOp::Eq, Value::text("confirmed")));
    assert_eq!(reload.last().unwrap(), expected);

    bar.set_value("state", "bogus").unwrap();
    bar.apply().await.unwrap();
    assert!(reload.last().unwrap().is_empty());
    bar.unmount();
}

#[tokio::test]
async fn alternate_path_text_fields_compile_to_a_disjunction() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::invoices_bar(), service, reload.clone(), notifier).unwrap();

    bar.set_value("number", "X7").unwrap();
    bar.apply().await.unwrap();

    let mut expected = FilterExpression::empty();
    expected.push_any(vec![
        Predicate::contains_ci("number", "X7"),
        Predicate::contains_ci("reference", "X7"),
    ]);
    assert_eq!(reload.last().unwrap(), expected);
    bar.unmount();
}

#[tokio::test]
async fn compiled_scenario_matches_exactly_and_reloads_once() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload.clone(), notifier.clone()).unwrap();

    bar.set_value("from", "2024-06-01").unwrap();
    bar.set_value("to", "2024-06-30").unwrap();
    bar.set_value("number", "INV/001").unwrap();
    bar.apply().await.unwrap();

    let expected = FilterExpression::empty()
        .with(Predicate::new("order_date", CompareOp::Ge, Value::Date(date(2024, 6, 1))))
        .with(Predicate::new("order_date", CompareOp::Le, Value::Date(date(2024, 6, 30))))
        .with(Predicate::contains_ci("name", "INV/001"));
    assert_eq!(reload.calls(), vec![expected]);
    assert!(notifier.severities().contains(&Severity::Success));
    bar.unmount();
}

#[tokio::test]
async fn unknown_field_is_rejected() {
    let (service, reload, notifier) = collaborators();
    let bar = FilterBar::mount(catalog::sales_bar(), service, reload, notifier).unwrap();

    let err = bar.set_value("no_such_field", "x");
    assert!(matches!(err, Err(BarError::UnknownField { name }) if name == "no_such_field"));
    bar.unmount();
}

#[tokio::test]
async fn duplicate_field_names_fail_at_mount() {
    let (service, reload, notifier) = collaborators();
    let schema = siftbar::BarSchema::new("dup", "order")
        .with_field(siftbar::FieldSchema::text("number", "name"))
        .with_field(siftbar::FieldSchema::text("number", "reference"));

    let err = FilterBar::mount(schema, service, reload, notifier);
    assert!(matches!(err, Err(BarError::DuplicateField { name }) if name == "number"));
}
