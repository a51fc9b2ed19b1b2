//! The Repository (C2): bulk upsert, id resolution, by-key lookup, and the
//! two search paths, all against a single PostgreSQL store.
//!
//! Functions suffixed `_with` take any `tokio_postgres::GenericClient` —
//! a plain pooled `Client` or a `Transaction` — so the Batch Writer (in
//! `abr-etl`) can run the upsert, the name delete, and the name insert
//! inside one transaction it owns, while the HTTP-facing `Repository`
//! methods below open their own single-statement transaction per call.

use std::collections::HashMap;
use std::time::Instant;

use chrono::NaiveDate;
use deadpool_postgres::Pool;
use postgres_types::ToSql;
use tokio_postgres::{GenericClient, Row};

use abr_domain::{Business, BusinessName, NormalizedBusiness, Pagination, ResponseMeta, SearchPage, SearchQuery};

use crate::error::{classify, StorageError, StorageResult};
use crate::query::{build_prefix_tsquery, like_pattern};

/// Bound-value cap PostgreSQL's wire protocol enforces per statement.
pub const POSTGRES_MAX_BOUND_PARAMS: usize = 65_535;

const BUSINESS_COLUMNS: usize = 14;
const NAME_COLUMNS: usize = 3;

/// Default sub-batch size for business upserts (§4.2.1): well under the
/// ~4,680-row ceiling `POSTGRES_MAX_BOUND_PARAMS / BUSINESS_COLUMNS` implies,
/// chosen to keep single-statement latency bounded on remote stores.
pub const DEFAULT_UPSERT_CHUNK_SIZE: usize = 1_000;

/// Default sub-batch size for name inserts, analogous to the above.
pub const DEFAULT_NAME_INSERT_CHUNK_SIZE: usize = 5_000;

type Param = Box<dyn ToSql + Sync + Send>;

fn as_refs(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect()
}

/// Outcome of a bulk upsert: how many rows were submitted, and how many of
/// those were fresh inserts vs. updates to an existing `abn`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub submitted: usize,
    pub inserted: u64,
    pub updated: u64,
}

/// The PostgreSQL repository. Holds a `deadpool_postgres::Pool` private to
/// whichever plane constructed it (serving or ingestion) — see
/// `abr_persistence::config::DatabaseConfig::build_pool`.
pub struct Repository {
    pool: Pool,
    max_candidates: u64,
}

impl Repository {
    pub fn new(pool: Pool, max_candidates: u64) -> Self {
        Self { pool, max_candidates }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// §4.2.1. Opens its own transaction; the Batch Writer instead calls
    /// [`bulk_upsert_with`] directly against the transaction it already owns.
    pub async fn bulk_upsert(&self, rows: &[NormalizedBusiness]) -> StorageResult<usize> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await.map_err(classify)?;
        let outcome = bulk_upsert_with(&txn, rows).await?;
        txn.commit().await.map_err(classify)?;
        Ok(outcome.submitted)
    }

    pub async fn bulk_insert_names(
        &self,
        rows: &[(i64, abr_domain::RawBusinessName)],
    ) -> StorageResult<usize> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await.map_err(classify)?;
        let n = bulk_insert_names_with(&txn, rows).await?;
        txn.commit().await.map_err(classify)?;
        Ok(n)
    }

    pub async fn get_ids_by_abns(&self, abns: &[String]) -> StorageResult<HashMap<String, i64>> {
        let client = self.pool.get().await?;
        get_ids_by_abns_with(&*client, abns).await
    }

    /// §4.2.3. Two statements, no join: the business row, then its names.
    pub async fn find_by_abn(&self, abn: &str) -> StorageResult<(Option<Business>, u64)> {
        let started = Instant::now();
        let client = self.pool.get().await?;

        let row = client
            .query_opt(&format!("{BUSINESS_SELECT_COLUMNS} FROM businesses WHERE abn = $1"), &[&abn])
            .await
            .map_err(classify)?;

        let business = match row {
            None => None,
            Some(row) => {
                let business_id: i64 = row.get(0);
                let name_rows = client
                    .query(
                        "SELECT business_id, name_type, name_text FROM business_names WHERE business_id = $1",
                        &[&business_id],
                    )
                    .await
                    .map_err(classify)?;
                let names = name_rows.iter().map(row_to_business_name).collect();
                let mut business = row_to_business(&row);
                business.business_names = Some(names);
                Some(business)
            }
        };

        Ok((business, started.elapsed().as_millis() as u64))
    }

    /// §4.2.4 — baseline substring path.
    pub async fn search_native(&self, query: &SearchQuery) -> StorageResult<SearchPage<Business>> {
        if !query.has_term() {
            return self.find_with_filters(query).await;
        }

        let mut params: Vec<Param> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        let term = query.term.as_deref().unwrap_or_default();
        params.push(Box::new(like_pattern(term)));
        clauses.push(format!("entity_name ILIKE ${} ESCAPE '\\'", params.len()));

        push_filter_clauses(query, &mut clauses, &mut params);

        self.run_search(clauses, params, query).await
    }

    /// §4.2.5 — index-backed path.
    pub async fn search_optimized(&self, query: &SearchQuery) -> StorageResult<SearchPage<Business>> {
        if !query.has_term() {
            return self.find_with_filters(query).await;
        }

        let mut params: Vec<Param> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        let term = query.term.as_deref().unwrap_or_default();
        params.push(Box::new(build_prefix_tsquery(term)));
        clauses.push(format!("search_tokens @@ to_tsquery('english', ${})", params.len()));

        push_filter_clauses(query, &mut clauses, &mut params);

        self.run_search(clauses, params, query).await
    }

    /// §4.2.7 — filters only, no text predicate.
    pub async fn find_with_filters(&self, query: &SearchQuery) -> StorageResult<SearchPage<Business>> {
        let mut params: Vec<Param> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();
        push_filter_clauses(query, &mut clauses, &mut params);
        self.run_search(clauses, params, query).await
    }

    /// Shared pagination envelope (§4.2.6) for all three search operations.
    async fn run_search(
        &self,
        clauses: Vec<String>,
        mut params: Vec<Param>,
        query: &SearchQuery,
    ) -> StorageResult<SearchPage<Business>> {
        let started = Instant::now();
        let client = self.pool.get().await?;

        let predicate = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let filter_param_count = params.len();
        params.push(Box::new(self.max_candidates as i64));
        let max_candidates_idx = params.len();

        let count_sql = format!(
            "SELECT count(*) FROM (SELECT 1 FROM businesses {predicate} ORDER BY entity_name LIMIT ${max_candidates_idx}) AS capped"
        );
        let count_row = client
            .query_one(&count_sql, &as_refs(&params))
            .await
            .map_err(classify)?;
        let total: i64 = count_row.get(0);
        let total = total as u64;

        params.truncate(filter_param_count);
        params.push(Box::new(query.limit as i64));
        let limit_idx = params.len();
        params.push(Box::new(query.offset()));
        let offset_idx = params.len();

        let page_sql = format!(
            "{BUSINESS_SELECT_COLUMNS} FROM businesses {predicate} ORDER BY entity_name ASC, id ASC LIMIT ${limit_idx} OFFSET ${offset_idx}"
        );
        let rows = client
            .query(&page_sql, &as_refs(&params))
            .await
            .map_err(classify)?;

        let data = rows.iter().map(row_to_business).collect();
        let pagination = Pagination::new(query.page.max(1), query.limit, total);

        Ok(SearchPage {
            data,
            pagination,
            meta: ResponseMeta {
                query_time_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

fn push_filter_clauses(query: &SearchQuery, clauses: &mut Vec<String>, params: &mut Vec<Param>) {
    if let Some(state) = non_empty(&query.state) {
        params.push(Box::new(state));
        clauses.push(format!("state = ${}", params.len()));
    }
    if let Some(postcode) = non_empty(&query.postcode) {
        params.push(Box::new(postcode));
        clauses.push(format!("postcode = ${}", params.len()));
    }
    if let Some(entity_type) = non_empty(&query.entity_type) {
        params.push(Box::new(entity_type));
        clauses.push(format!("entity_type_code = ${}", params.len()));
    }
    if let Some(abn_status) = non_empty(&query.abn_status) {
        params.push(Box::new(abn_status));
        clauses.push(format!("abn_status = ${}", params.len()));
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(|s| s.to_string())
}

const BUSINESS_SELECT_COLUMNS: &str = "SELECT id, abn, abn_status, abn_status_from, entity_type_code, entity_type_text, \
     entity_name, given_name, family_name, state, postcode, gst_status, gst_from_date, acn, record_last_updated";

fn row_to_business(row: &Row) -> Business {
    Business {
        id: row.get("id"),
        abn: row.get("abn"),
        abn_status: row.get("abn_status"),
        abn_status_from: row.get::<_, Option<NaiveDate>>("abn_status_from"),
        entity_type_code: row.get("entity_type_code"),
        entity_type_text: row.get("entity_type_text"),
        entity_name: row.get("entity_name"),
        given_name: row.get("given_name"),
        family_name: row.get("family_name"),
        state: row.get("state"),
        postcode: row.get("postcode"),
        gst_status: row.get("gst_status"),
        gst_from_date: row.get::<_, Option<NaiveDate>>("gst_from_date"),
        acn: row.get("acn"),
        record_last_updated: row.get::<_, Option<NaiveDate>>("record_last_updated"),
        business_names: None,
    }
}

fn row_to_business_name(row: &Row) -> BusinessName {
    BusinessName {
        business_id: row.get("business_id"),
        name_type: row.get("name_type"),
        name_text: row.get("name_text"),
    }
}

/// §4.2.1 against an already-open transaction or client.
pub async fn bulk_upsert_with<C: GenericClient>(
    client: &C,
    rows: &[NormalizedBusiness],
) -> StorageResult<UpsertOutcome> {
    if rows.is_empty() {
        return Ok(UpsertOutcome::default());
    }

    let mut inserted = 0u64;
    let mut updated = 0u64;

    for chunk in rows.chunks(DEFAULT_UPSERT_CHUNK_SIZE) {
        debug_assert!(
            chunk.len() * BUSINESS_COLUMNS < POSTGRES_MAX_BOUND_PARAMS,
            "upsert chunk would exceed the wire-protocol parameter cap"
        );

        let (sql, params) = build_upsert_statement(chunk);
        let result_rows = client.query(&sql, &as_refs(&params)).await.map_err(classify)?;
        for row in result_rows {
            let was_inserted: bool = row.get(0);
            if was_inserted {
                inserted += 1;
            } else {
                updated += 1;
            }
        }
    }

    Ok(UpsertOutcome {
        submitted: rows.len(),
        inserted,
        updated,
    })
}

fn build_upsert_statement(rows: &[NormalizedBusiness]) -> (String, Vec<Param>) {
    let mut params: Vec<Param> = Vec::with_capacity(rows.len() * BUSINESS_COLUMNS);
    let mut value_groups: Vec<String> = Vec::with_capacity(rows.len());

    for row in rows {
        let base = params.len();
        params.push(Box::new(row.abn.clone()));
        params.push(Box::new(row.abn_status.clone()));
        params.push(Box::new(row.abn_status_from));
        params.push(Box::new(row.entity_type_code.clone()));
        params.push(Box::new(row.entity_type_text.clone()));
        params.push(Box::new(row.entity_name.clone()));
        params.push(Box::new(row.given_name.clone()));
        params.push(Box::new(row.family_name.clone()));
        params.push(Box::new(row.state.clone()));
        params.push(Box::new(row.postcode.clone()));
        params.push(Box::new(row.gst_status.clone()));
        params.push(Box::new(row.gst_from_date));
        params.push(Box::new(row.acn.clone()));
        params.push(Box::new(row.record_last_updated));

        let placeholders: Vec<String> = (1..=BUSINESS_COLUMNS).map(|i| format!("${}", base + i)).collect();
        value_groups.push(format!("({})", placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO businesses (abn, abn_status, abn_status_from, entity_type_code, entity_type_text, \
         entity_name, given_name, family_name, state, postcode, gst_status, gst_from_date, acn, record_last_updated) \
         VALUES {} \
         ON CONFLICT (abn) DO UPDATE SET \
         abn_status = EXCLUDED.abn_status, \
         abn_status_from = EXCLUDED.abn_status_from, \
         entity_type_code = EXCLUDED.entity_type_code, \
         entity_type_text = EXCLUDED.entity_type_text, \
         entity_name = EXCLUDED.entity_name, \
         given_name = EXCLUDED.given_name, \
         family_name = EXCLUDED.family_name, \
         state = EXCLUDED.state, \
         postcode = EXCLUDED.postcode, \
         gst_status = EXCLUDED.gst_status, \
         gst_from_date = EXCLUDED.gst_from_date, \
         acn = EXCLUDED.acn, \
         record_last_updated = EXCLUDED.record_last_updated, \
         updated_at = now() \
         RETURNING (xmax = 0) AS inserted",
        value_groups.join(", ")
    );

    (sql, params)
}

/// §4.3.2 step 3c, also usable standalone (§4.2.2).
pub async fn bulk_insert_names_with<C: GenericClient>(
    client: &C,
    rows: &[(i64, abr_domain::RawBusinessName)],
) -> StorageResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    for chunk in rows.chunks(DEFAULT_NAME_INSERT_CHUNK_SIZE) {
        debug_assert!(
            chunk.len() * NAME_COLUMNS < POSTGRES_MAX_BOUND_PARAMS,
            "name-insert chunk would exceed the wire-protocol parameter cap"
        );

        let mut params: Vec<Param> = Vec::with_capacity(chunk.len() * NAME_COLUMNS);
        let mut value_groups: Vec<String> = Vec::with_capacity(chunk.len());

        for (business_id, name) in chunk {
            let base = params.len();
            params.push(Box::new(*business_id));
            params.push(Box::new(name.name_type.clone()));
            params.push(Box::new(name.name_text.clone()));
            value_groups.push(format!("(${}, ${}, ${})", base + 1, base + 2, base + 3));
        }

        let sql = format!(
            "INSERT INTO business_names (business_id, name_type, name_text) VALUES {}",
            value_groups.join(", ")
        );
        client.execute(&sql, &as_refs(&params)).await.map_err(classify)?;
    }

    Ok(rows.len())
}

/// §4.2.2 / §4.3.2 step 3a.
pub async fn get_ids_by_abns_with<C: GenericClient>(
    client: &C,
    abns: &[String],
) -> StorageResult<HashMap<String, i64>> {
    if abns.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = client
        .query("SELECT abn, id FROM businesses WHERE abn = ANY($1)", &[&abns])
        .await
        .map_err(classify)?;

    Ok(rows.into_iter().map(|row| (row.get("abn"), row.get("id"))).collect())
}

/// §4.3.2 step 3b.
pub async fn delete_names_for_business_ids_with<C: GenericClient>(
    client: &C,
    business_ids: &[i64],
) -> StorageResult<u64> {
    if business_ids.is_empty() {
        return Ok(0);
    }

    client
        .execute(
            "DELETE FROM business_names WHERE business_id = ANY($1)",
            &[&business_ids],
        )
        .await
        .map_err(classify)
}
