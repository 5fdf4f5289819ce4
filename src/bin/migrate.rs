use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::Path;

fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    println!("Starting database migration...");

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "foodloop.db".to_string());
    if database_url == ":memory:" {
        println!("DATABASE_URL is in-memory; the schema is applied at start-up instead.");
        return Ok(());
    }

    // In Docker, this will be at /app/migrations/init.sql
    let migration_path = env::var("MIGRATION_FILE").unwrap_or_else(|_| "migrations/init.sql".to_string());
    if !Path::new(&migration_path).exists() {
        println!("Migration file not found at: {}", migration_path);
        return Ok(());
    }
    let sql_content = fs::read_to_string(&migration_path)?;

    println!("Opening {}...", database_url);
    let mut conn = Connection::open(&database_url)?;
    conn.busy_timeout(std::time::Duration::from_secs(60))?;

    // Statements are all IF NOT EXISTS, so a partial earlier run is fine.
    let tx = conn.transaction()?;
    tx.execute_batch(&sql_content)
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tx.commit()?;

    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    println!("Migration complete and committed ({} tables).", tables);
    Ok(())
}
