//! Schema & Index Layer (C1).
//!
//! Idempotent DDL applied once at startup. Safe to run on every process
//! start: every statement is `IF NOT EXISTS`/`CREATE OR REPLACE`, and the
//! `search_tokens` backfill only touches rows where the column is still null.

use deadpool_postgres::Client;

use crate::error::{classify, StorageResult};

/// Current schema version, tracked in `schema_version` the same way the
/// backfill is tracked — so a future column addition can be expressed as
/// `migrate_to(client, N).await?` without re-running everything from v1.
pub const SCHEMA_VERSION: i32 = 1;

/// Creates tables, indexes, the `search_tokens` trigger, and runs the
/// one-shot backfill if the schema was just created.
pub async fn initialize(client: &Client) -> StorageResult<()> {
    let current = get_schema_version(client).await?;

    if current < 1 {
        create_tables(client).await?;
        create_indexes(client).await?;
        install_search_tokens_trigger(client).await?;
        backfill_search_tokens(client).await?;
        set_schema_version(client, 1).await?;
    }

    Ok(())
}

async fn get_schema_version(client: &Client) -> StorageResult<i32> {
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
            &[],
        )
        .await
        .map_err(classify)?;

    let row = client
        .query_opt("SELECT version FROM schema_version LIMIT 1", &[])
        .await
        .map_err(classify)?;

    Ok(row.map(|r| r.get::<_, i32>(0)).unwrap_or(0))
}

async fn set_schema_version(client: &Client, version: i32) -> StorageResult<()> {
    client
        .execute("DELETE FROM schema_version", &[])
        .await
        .map_err(classify)?;
    client
        .execute(
            "INSERT INTO schema_version (version) VALUES ($1)",
            &[&version],
        )
        .await
        .map_err(classify)?;
    Ok(())
}

async fn create_tables(client: &Client) -> StorageResult<()> {
    client
        .batch_execute(
            "
            CREATE TABLE IF NOT EXISTS businesses (
                id BIGSERIAL PRIMARY KEY,
                abn TEXT NOT NULL UNIQUE,
                abn_status TEXT NOT NULL,
                abn_status_from DATE,
                entity_type_code TEXT NOT NULL,
                entity_type_text TEXT,
                entity_name TEXT NOT NULL,
                given_name TEXT,
                family_name TEXT,
                state TEXT,
                postcode TEXT,
                gst_status TEXT,
                gst_from_date DATE,
                acn TEXT,
                record_last_updated DATE,
                search_tokens TSVECTOR,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS business_names (
                id BIGSERIAL PRIMARY KEY,
                business_id BIGINT NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
                name_type TEXT NOT NULL,
                name_text TEXT NOT NULL
            );
            ",
        )
        .await
        .map_err(classify)?;
    Ok(())
}

async fn create_indexes(client: &Client) -> StorageResult<()> {
    client
        .batch_execute(
            "
            CREATE INDEX IF NOT EXISTS idx_businesses_search_tokens ON businesses USING GIN (search_tokens);
            CREATE INDEX IF NOT EXISTS idx_businesses_abn_status ON businesses (abn_status);
            CREATE INDEX IF NOT EXISTS idx_businesses_entity_type_code ON businesses (entity_type_code);
            CREATE INDEX IF NOT EXISTS idx_businesses_state ON businesses (state);
            CREATE INDEX IF NOT EXISTS idx_businesses_postcode ON businesses (postcode);
            CREATE INDEX IF NOT EXISTS idx_business_names_business_id ON business_names (business_id);
            ",
        )
        .await
        .map_err(classify)?;
    Ok(())
}

/// Installs the before-write trigger that derives `search_tokens` from
/// `entity_name` (weight A), `given_name`/`family_name` (weight B), and
/// `state`/`postcode` (weight C). The weights are retained for forward
/// compatibility even though no current query computes a weighted rank.
async fn install_search_tokens_trigger(client: &Client) -> StorageResult<()> {
    client
        .batch_execute(
            "
            CREATE OR REPLACE FUNCTION businesses_search_tokens_trigger() RETURNS trigger AS $$
            BEGIN
                NEW.search_tokens :=
                    setweight(to_tsvector('english', coalesce(NEW.entity_name, '')), 'A') ||
                    setweight(to_tsvector('english', coalesce(NEW.given_name, '') || ' ' || coalesce(NEW.family_name, '')), 'B') ||
                    setweight(to_tsvector('english', coalesce(NEW.state, '') || ' ' || coalesce(NEW.postcode, '')), 'C');
                RETURN NEW;
            END
            $$ LANGUAGE plpgsql;

            DROP TRIGGER IF EXISTS trg_businesses_search_tokens ON businesses;
            CREATE TRIGGER trg_businesses_search_tokens
                BEFORE INSERT OR UPDATE OF entity_name, given_name, family_name, state, postcode
                ON businesses
                FOR EACH ROW
                EXECUTE FUNCTION businesses_search_tokens_trigger();
            ",
        )
        .await
        .map_err(classify)?;
    Ok(())
}

async fn backfill_search_tokens(client: &Client) -> StorageResult<()> {
    client
        .execute(
            "UPDATE businesses SET entity_name = entity_name WHERE search_tokens IS NULL",
            &[],
        )
        .await
        .map_err(classify)?;
    Ok(())
}
