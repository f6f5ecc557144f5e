//! Test fixtures for catalog integration tests
//!
//! Snapshots shaped like what `spanline sync-catalog` writes for a small
//! shop database.

use spanline_catalog::{CatalogBuilder, DatabaseMetadata};

/// A shop database with tables, a view, a sequence and two overloads
pub fn shop_database() -> DatabaseMetadata {
    CatalogBuilder::new("shop")
        .with_table("public", "users", &["id", "email", "name", "created_at"])
        .with_table("public", "orders", &["id", "user_id", "total_amount", "status"])
        .with_table("sales", "orders", &["id", "region"])
        .with_view(
            "public",
            "active_users",
            "SELECT id, email FROM users WHERE created_at > now() - interval '30 days'",
        )
        .with_sequence("public", "orders_id_seq")
        .with_external_table("public", "remote_events", &["event_id", "payload"])
        .with_function(
            "public",
            "order_total",
            "CREATE FUNCTION public.order_total(p_id integer) RETURNS numeric LANGUAGE sql AS $$ SELECT total_amount FROM orders WHERE id = p_id $$",
        )
        .with_function(
            "public",
            "order_total",
            "CREATE FUNCTION public.order_total(p_id integer, p_status text) RETURNS numeric LANGUAGE sql AS $$ SELECT total_amount FROM orders WHERE id = p_id AND status = p_status $$",
        )
        .into_metadata()
}

/// The same snapshot as JSON text
pub fn shop_database_json() -> String {
    serde_json::to_string_pretty(&shop_database()).unwrap()
}
