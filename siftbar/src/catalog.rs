//! Built-in bar blueprints, one per document type.
//!
//! Every document type supplies only a schema; the compiling logic lives in
//! [`crate::bar::FilterBar`]. Blueprints auto-register process-wide via
//! `inventory`, so hosts look them up by key instead of linking against a
//! per-document module. Where the source behaviors diverged (mandatory date
//! bounds, global vs scoped shortcuts, Escape-to-clear), each blueprint
//! states its choice explicitly in its builder.

use std::borrow::Cow;

use crate::errors::{BarError, QueryError};
use crate::expr::FilterExpression;
use crate::resolver::ResolverConfig;
use crate::schema::{BarSchema, DatePolicy, Direction, EnumChoice, FieldKind, FieldSchema, RelatedLookup, ShortcutScope};
use crate::service::{QueryService, SearchOptions, SortOrder};

/// A registered document-type schema.
pub struct BarBlueprint {
    pub key: &'static str,
    pub title: &'static str,
    pub build: fn() -> BarSchema,
}

inventory::collect!(BarBlueprint);

/// Look up a blueprint by key.
pub fn blueprint(key: &str) -> Option<&'static BarBlueprint> {
    inventory::iter::<BarBlueprint>().find(|entry| entry.key == key)
}

/// All registered blueprints.
pub fn blueprints() -> impl Iterator<Item = &'static BarBlueprint> {
    inventory::iter::<BarBlueprint>()
}

// ---- Shared resolver domains ----------------------------------------------

fn partner_resolver() -> ResolverConfig {
    ResolverConfig::new("partner", "id", "name").with_code("ref")
}

fn product_resolver() -> ResolverConfig {
    ResolverConfig::new("product", "id", "name").with_code("default_code")
}

// ---- Blueprints ------------------------------------------------------------

/// Shipment bars come in two directions; the direction flag decides at
/// construction time whether the partner slot is a vendor or a customer.
/// Only one of the two is ever rendered on a given bar.
pub fn shipment_bar(direction: Direction) -> BarSchema {
    let (key, partner) = match direction {
        Direction::Inbound => (
            "receipts",
            FieldSchema::reference("vendor", "partner_id", "partner_name", partner_resolver())
                .with_placeholder("Vendor"),
        ),
        Direction::Outbound => (
            "deliveries",
            FieldSchema::reference("customer", "partner_id", "partner_name", partner_resolver())
                .with_placeholder("Customer"),
        ),
    };

    BarSchema::new(key, "shipment")
        .with_date_policy(DatePolicy::BothRequired)
        .with_field(FieldSchema::date_from("from", "scheduled_date").with_placeholder("From"))
        .with_field(FieldSchema::date_to("to", "scheduled_date").with_placeholder("To"))
        .with_field(FieldSchema::text("number", "name").with_placeholder("Reference"))
        .with_field(partner)
        .with_field(FieldSchema::text("tracking", "tracking_code").with_placeholder("Tracking code"))
}

fn receipts_bar() -> BarSchema {
    shipment_bar(Direction::Inbound)
}

fn deliveries_bar() -> BarSchema {
    shipment_bar(Direction::Outbound)
}

pub fn purchases_bar() -> BarSchema {
    BarSchema::new("purchases", "purchase_order")
        .with_date_policy(DatePolicy::BothRequired)
        .with_field(FieldSchema::date_from("from", "order_date").with_placeholder("From"))
        .with_field(FieldSchema::date_to("to", "order_date").with_placeholder("To"))
        .with_field(FieldSchema::text("number", "name").with_placeholder("Order"))
        .with_field(FieldSchema::reference("vendor", "partner_id", "partner_name", partner_resolver()).with_placeholder("Vendor"))
        .with_field(FieldSchema::enumeration(
            "state",
            "state",
            [
                EnumChoice::new("draft", "Draft"),
                EnumChoice::new("confirmed", "Confirmed"),
                EnumChoice::new("done", "Done"),
                EnumChoice::new("cancelled", "Cancelled"),
            ],
        ))
        .with_field(FieldSchema::number("amount", "amount_total").with_placeholder("Total"))
}

pub fn rfq_bar() -> BarSchema {
    BarSchema::new("rfq", "purchase_order")
        .with_date_policy(DatePolicy::BothRequired)
        .with_field(FieldSchema::date_from("from", "order_date").with_placeholder("From"))
        .with_field(FieldSchema::date_to("to", "order_date").with_placeholder("To"))
        .with_field(FieldSchema::text("number", "name").with_placeholder("Request"))
        .with_field(FieldSchema::reference("vendor", "partner_id", "partner_name", partner_resolver()).with_placeholder("Vendor"))
}

pub fn sales_bar() -> BarSchema {
    BarSchema::new("sales", "sale_order")
        .with_shortcut_scope(ShortcutScope::Global)
        .with_field(FieldSchema::date_from("from", "order_date").with_placeholder("From"))
        .with_field(FieldSchema::date_to("to", "order_date").with_placeholder("To"))
        .with_field(FieldSchema::text("number", "name").with_placeholder("Order"))
        .with_field(FieldSchema::reference("customer", "partner_id", "partner_name", partner_resolver()).with_placeholder("Customer"))
        .with_field(FieldSchema::number("amount", "amount_total").with_placeholder("Total"))
        .with_field(FieldSchema::related(
            "tracking",
            RelatedLookup {
                entity: "shipment".to_string(),
                match_path: "tracking_code".to_string(),
                collect_path: "order_id".to_string(),
                target_path: "id".to_string(),
            },
        ))
}

pub fn invoices_bar() -> BarSchema {
    BarSchema::new("invoices", "invoice")
        .with_escape_clears(true)
        .with_field(FieldSchema::date_from("from", "invoice_date").with_placeholder("From"))
        .with_field(FieldSchema::date_to("to", "invoice_date").with_placeholder("To"))
        .with_field(FieldSchema::text_any("number", ["number", "reference"]).with_placeholder("Invoice or reference"))
        .with_field(FieldSchema::reference("partner", "partner_id", "partner_name", partner_resolver()).with_placeholder("Partner"))
        .with_field(FieldSchema::enumeration(
            "state",
            "state",
            [
                EnumChoice::new("draft", "Draft"),
                EnumChoice::new("open", "Open"),
                EnumChoice::new("paid", "Paid"),
                EnumChoice::new("cancelled", "Cancelled"),
            ],
        ))
        .with_field(FieldSchema::number("amount", "amount_total").with_placeholder("Total"))
}

pub fn stock_bar() -> BarSchema {
    BarSchema::new("stock", "stock_level")
        .with_field(FieldSchema::reference("product", "product_id", "product_name", product_resolver()).with_placeholder("Product"))
        .with_field(FieldSchema::enumeration("warehouse", "warehouse_id", Vec::new()))
        .with_field(FieldSchema::enumeration("location", "location_id", Vec::new()))
}

inventory::submit! {
    BarBlueprint { key: "receipts", title: "Incoming shipments", build: receipts_bar }
}
inventory::submit! {
    BarBlueprint { key: "deliveries", title: "Outgoing shipments", build: deliveries_bar }
}
inventory::submit! {
    BarBlueprint { key: "purchases", title: "Purchase orders", build: purchases_bar }
}
inventory::submit! {
    BarBlueprint { key: "rfq", title: "Requests for quotation", build: rfq_bar }
}
inventory::submit! {
    BarBlueprint { key: "sales", title: "Sales orders", build: sales_bar }
}
inventory::submit! {
    BarBlueprint { key: "invoices", title: "Customer invoices", build: invoices_bar }
}
inventory::submit! {
    BarBlueprint { key: "stock", title: "Stock lookup", build: stock_bar }
}

// ---- Pick-list population --------------------------------------------------

const DEFAULT_CHOICE_LIMIT: u64 = 50;

/// Fetch enum choices (warehouses, locations, users) from the query service,
/// ordered by label.
pub async fn load_choices(
    service: &dyn QueryService,
    entity: &str,
    id_field: &str,
    label_field: &str,
) -> Result<Vec<EnumChoice>, QueryError> {
    let rows = service
        .search(
            entity,
            &FilterExpression::empty(),
            &[id_field, label_field],
            SearchOptions::new()
                .with_limit(DEFAULT_CHOICE_LIMIT)
                .with_order(label_field, SortOrder::Asc),
        )
        .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let id_value = row.get(id_field)?;
            let value = id_value
                .as_i64()
                .map(|v| v.to_string())
                .or_else(|| id_value.as_str().map(String::from))?;
            let label = row.get(label_field)?.as_str()?.to_string();
            Some(EnumChoice::new(value, label))
        })
        .collect())
}

/// Populate an enum field's choices in place before mounting the schema.
pub async fn populate_enum(
    schema: &mut BarSchema,
    field: &str,
    service: &dyn QueryService,
    entity: &str,
    id_field: &str,
    label_field: &str,
) -> Result<(), BarError> {
    let choices = load_choices(service, entity, id_field, label_field)
        .await
        .map_err(|source| BarError::Lookup {
            entity: entity.to_string(),
            source,
        })?;

    let Some(field_schema) = schema.fields.iter_mut().find(|f| f.name == field) else {
        return Err(BarError::UnknownField { name: field.to_string() });
    };
    match &mut field_schema.kind {
        FieldKind::Enum { choices: slot, .. } => {
            *slot = choices;
            Ok(())
        }
        _ => Err(BarError::Other {
            message: Cow::Owned(format!("field '{}' is not an enum field", field)),
        }),
    }
}
