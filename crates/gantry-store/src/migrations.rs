pub const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS blobs (
        key TEXT PRIMARY KEY,
        value_json TEXT NOT NULL
    )
    "#,
];
