use rusqlite::Connection;

pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS files_updated_at ON files(updated_at DESC);

        CREATE TRIGGER IF NOT EXISTS files_touch_updated AFTER UPDATE OF content, name ON files
        BEGIN
            UPDATE files SET updated_at = strftime('%s', 'now') WHERE id = new.id;
        END;
        "#,
    )
}
