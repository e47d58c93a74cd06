use rusqlite::{Connection, Result};

/// Initialise every table for the engine. Safe to call on every startup —
/// `CREATE TABLE IF NOT EXISTS` makes it idempotent, so no separate
/// migration tool is required for this crate's own tables (schema
/// evolution beyond that is out of scope, §6).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    create_tenants_table(conn)?;
    create_users_table(conn)?;
    create_credentials_table(conn)?;
    create_global_channels_table(conn)?;
    create_channel_subscriptions_table(conn)?;
    create_rules_table(conn)?;
    create_global_messages_table(conn)?;
    create_rule_analysis_progress_table(conn)?;
    create_leads_table(conn)?;
    create_notifications_table(conn)?;
    Ok(())
}

fn create_tenants_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenants (
            id          TEXT PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            plan        TEXT NOT NULL DEFAULT 'free',
            deleted_at  TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;",
    )
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id                              TEXT PRIMARY KEY NOT NULL,
            tenant_id                       TEXT NOT NULL REFERENCES tenants(id),
            email                           TEXT NOT NULL,
            full_name                       TEXT NOT NULL DEFAULT '',
            in_app_notifications_enabled    INTEGER NOT NULL DEFAULT 1,
            email_notifications_enabled     INTEGER NOT NULL DEFAULT 0,
            bot_push_enabled                INTEGER NOT NULL DEFAULT 0,
            bot_push_chat_id                TEXT,
            notify_on_new_lead               INTEGER NOT NULL DEFAULT 1,
            notify_on_lead_status_change     INTEGER NOT NULL DEFAULT 1,
            notify_on_lead_assignment        INTEGER NOT NULL DEFAULT 1,
            created_at                      TEXT NOT NULL,
            updated_at                      TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_users_tenant ON users (tenant_id);",
    )
}

fn create_credentials_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chat_platform_credentials (
            id          TEXT PRIMARY KEY NOT NULL,
            tenant_id   TEXT NOT NULL REFERENCES tenants(id),
            session_blob BLOB NOT NULL,
            status      TEXT NOT NULL DEFAULT 'active',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_credentials_tenant ON chat_platform_credentials (tenant_id);
        CREATE INDEX IF NOT EXISTS idx_credentials_status ON chat_platform_credentials (status);",
    )
}

fn create_global_channels_table(conn: &Connection) -> Result<()> {
    // external_id is the true dedupe key across the whole fleet; external_handle
    // is unique only when present (SQLite treats distinct NULLs as non-equal,
    // so a partial-uniqueness-over-non-null column needs no special handling).
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS global_channels (
            id                          TEXT PRIMARY KEY NOT NULL,
            external_id                 INTEGER NOT NULL,
            external_handle             TEXT,
            title                       TEXT,
            kind                        TEXT NOT NULL DEFAULT 'chat',
            active                      INTEGER NOT NULL DEFAULT 1,
            last_external_message_id    INTEGER,
            last_collected_at           TEXT,
            created_at                  TEXT NOT NULL,
            updated_at                  TEXT NOT NULL,
            UNIQUE(external_id)
        ) STRICT;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_channels_handle
            ON global_channels (external_handle) WHERE external_handle IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_channels_active ON global_channels (active);",
    )
}

fn create_channel_subscriptions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS channel_subscriptions (
            id              TEXT PRIMARY KEY NOT NULL,
            tenant_id       TEXT NOT NULL REFERENCES tenants(id),
            channel_id      TEXT NOT NULL REFERENCES global_channels(id),
            credential_id   TEXT NOT NULL REFERENCES chat_platform_credentials(id),
            active          INTEGER NOT NULL DEFAULT 1,
            tags            TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            UNIQUE(tenant_id, channel_id)
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_subscriptions_tenant ON channel_subscriptions (tenant_id, active);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_channel ON channel_subscriptions (channel_id);",
    )
}

fn create_rules_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rules (
            id              TEXT PRIMARY KEY NOT NULL,
            tenant_id       TEXT NOT NULL REFERENCES tenants(id),
            name            TEXT NOT NULL,
            description     TEXT,
            prompt          TEXT NOT NULL,
            threshold       REAL NOT NULL DEFAULT 0.0,
            channel_filter  TEXT NOT NULL DEFAULT '[]',  -- JSON array of channel ids, [] = all
            active          INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_rules_tenant ON rules (tenant_id, active);",
    )
}

fn create_global_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS global_messages (
            id                      TEXT PRIMARY KEY NOT NULL,
            channel_id              TEXT NOT NULL REFERENCES global_channels(id),
            external_message_id     INTEGER NOT NULL,
            text                    TEXT NOT NULL DEFAULT '',
            author_external_id      INTEGER,
            author_handle           TEXT,
            media_kind              TEXT,
            sent_at                 TEXT NOT NULL,
            ingested_at             TEXT NOT NULL,
            UNIQUE(channel_id, external_message_id)
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_messages_channel_sent
            ON global_messages (channel_id, sent_at, external_message_id);
        CREATE INDEX IF NOT EXISTS idx_messages_channel_external
            ON global_messages (channel_id, external_message_id);",
    )
}

fn create_rule_analysis_progress_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rule_analysis_progress (
            id                          TEXT PRIMARY KEY NOT NULL,
            rule_id                     TEXT NOT NULL REFERENCES rules(id),
            channel_id                  TEXT NOT NULL REFERENCES global_channels(id),
            last_analyzed_message_id    TEXT REFERENCES global_messages(id),
            last_analyzed_sent_at       TEXT,
            last_analyzed_at            TEXT,
            messages_analyzed           INTEGER NOT NULL DEFAULT 0,
            leads_created               INTEGER NOT NULL DEFAULT 0,
            created_at                  TEXT NOT NULL,
            updated_at                  TEXT NOT NULL,
            UNIQUE(rule_id, channel_id)
        ) STRICT;",
    )
}

fn create_leads_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS leads (
            id                  TEXT PRIMARY KEY NOT NULL,
            tenant_id           TEXT NOT NULL REFERENCES tenants(id),
            global_message_id   TEXT NOT NULL REFERENCES global_messages(id),
            rule_id             TEXT NOT NULL REFERENCES rules(id),
            score               REAL NOT NULL,
            reasoning           TEXT NOT NULL DEFAULT '',
            extracted_entities  TEXT NOT NULL DEFAULT '{}',  -- JSON
            status              TEXT NOT NULL DEFAULT 'new',
            assignee_user_id    TEXT REFERENCES users(id),
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            UNIQUE(tenant_id, global_message_id, rule_id)
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_leads_tenant ON leads (tenant_id, status);",
    )
}

fn create_notifications_table(conn: &Connection) -> Result<()> {
    // recipient_user_id is the sole owner column — see design notes on the
    // original tenant_id/user_id conflation this replaces.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notifications (
            id                  TEXT PRIMARY KEY NOT NULL,
            recipient_user_id   TEXT NOT NULL REFERENCES users(id),
            event_kind          TEXT NOT NULL,
            related_lead_id     TEXT REFERENCES leads(id),
            title               TEXT NOT NULL,
            message             TEXT NOT NULL,
            is_read             INTEGER NOT NULL DEFAULT 0,
            read_at             TEXT,
            created_at          TEXT NOT NULL
        ) STRICT;
        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications (recipient_user_id, is_read);",
    )
}
