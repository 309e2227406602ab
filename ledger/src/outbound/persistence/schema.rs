//! Diesel table definitions; must match the migrations exactly.

diesel::table! {
    /// Append-only transaction log. Rows are never updated or deleted.
    transactions (id) {
        id -> Uuid,
        user_id -> Uuid,
        #[sql_name = "type"]
        kind -> Varchar,
        amount -> Int8,
        idempotency_key -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Consolidated per-user snapshot; one row per user, advanced on every
    /// committed write.
    accounts (id) {
        id -> Uuid,
        user_id -> Uuid,
        balance -> Int8,
        version -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Idempotency reservations and finalized response envelopes.
    idempotency_keys (id) {
        id -> Uuid,
        key -> Varchar,
        response -> Text,
        created_at -> Timestamptz,
        expires_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(transactions, accounts, idempotency_keys);
