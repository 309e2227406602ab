//! Diesel table definitions; must match the migrations exactly.

diesel::table! {
    /// Registered users and their credential digests.
    users (id) {
        id -> Uuid,
        email -> Varchar,
        password_hash -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}
