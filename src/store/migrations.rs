//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "leads_and_interactions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                display_name TEXT,
                profile_url TEXT,
                channel TEXT,
                channel_user_id TEXT,
                phone TEXT,
                transaction_type TEXT,
                property_type TEXT,
                budget_min TEXT,
                budget_max TEXT,
                bedrooms_min INTEGER,
                bedrooms_max INTEGER,
                locations TEXT NOT NULL DEFAULT '[]',
                purpose TEXT,
                payment_preference TEXT,
                funnel_state TEXT NOT NULL DEFAULT 'language_select',
                pending_slot TEXT,
                filled_slots TEXT NOT NULL DEFAULT '{}',
                language TEXT NOT NULL DEFAULT 'en',
                transient_data TEXT NOT NULL DEFAULT '{}',
                messages_sent INTEGER NOT NULL DEFAULT 0,
                messages_received INTEGER NOT NULL DEFAULT 0,
                last_active_at TEXT,
                last_contacted_at TEXT,
                next_followup_at TEXT,
                followup_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'open',
                score INTEGER NOT NULL DEFAULT 0,
                grade TEXT NOT NULL DEFAULT 'D',
                matched_property_ids TEXT NOT NULL DEFAULT '[]',
                viewed_property_ids TEXT NOT NULL DEFAULT '[]',
                favorited_property_ids TEXT NOT NULL DEFAULT '[]',
                claimed_by TEXT,
                claimed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_leads_profile_url
                ON leads(tenant_id, profile_url) WHERE profile_url IS NOT NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_leads_channel_identity
                ON leads(tenant_id, channel, channel_user_id)
                WHERE channel_user_id IS NOT NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_leads_phone
                ON leads(tenant_id, phone) WHERE phone IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_leads_due
                ON leads(next_followup_at) WHERE next_followup_at IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_leads_tenant_status ON leads(tenant_id, status);

            CREATE TABLE IF NOT EXISTS interactions (
                id TEXT PRIMARY KEY,
                lead_id TEXT NOT NULL REFERENCES leads(id),
                channel TEXT NOT NULL,
                direction TEXT NOT NULL,
                body TEXT NOT NULL,
                automated INTEGER NOT NULL DEFAULT 0,
                delivered INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_lead ON interactions(lead_id);
        "#,
    },
    Migration {
        version: 2,
        name: "properties_and_matches",
        sql: r#"
            CREATE TABLE IF NOT EXISTS properties (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                title TEXT NOT NULL,
                price TEXT,
                property_type TEXT,
                transaction_type TEXT,
                location TEXT,
                bedrooms INTEGER,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_properties_tenant ON properties(tenant_id);

            CREATE TABLE IF NOT EXISTS property_matches (
                property_id TEXT NOT NULL,
                lead_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                reason TEXT NOT NULL DEFAULT '',
                notified INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (property_id, lead_id)
            );
        "#,
    },
    Migration {
        version: 3,
        name: "followup_campaigns",
        sql: r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                status_filter TEXT,
                min_score INTEGER,
                source_channel TEXT,
                body TEXT NOT NULL DEFAULT '{}',
                channels TEXT NOT NULL DEFAULT '[]',
                schedule TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (tenant_id, name)
            );
        "#,
    },
];

/// Apply all migrations newer than the recorded version.
pub async fn run(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations: {e}")))?;

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read version: {e}")))?;
    let current: i64 = match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get(0)
            .map_err(|e| DatabaseError::Migration(e.to_string()))?,
        None => 0,
    };

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration {} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}
