//! PostgreSQL/PostGIS place store.
//!
//! One run is one transaction. Upstream rows are streamed through `NO SCROLL`
//! cursors declared inside that transaction, so reads and upserts share the
//! connection without buffering a whole relation in memory. Cursor commands
//! go through the simple query protocol since they cannot be prepared.

use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres, Row, Transaction};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::app::ports::{PlaceSink, PlaceStore, RowSource, UnitOfWork};
use crate::config::{Config, SourceConfig};
use crate::domain::{ClassifiedRecord, ExternalId, PlaceId, RawTagSet, Shape, SourceRow};
use crate::error::{CompositorError, Result};

/// Database connection manager
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    pub async fn new(config: &Config) -> Result<Self> {
        let url = config.database_url()?;
        info!("Connecting to database: {}", mask_database_url(url));

        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                CompositorError::database(format!("Failed to connect to database: {e}"))
            })?;

        info!("Database connection pool created successfully");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn place_store(&self, config: &Config) -> PgPlaceStore {
        PgPlaceStore::new(self.pool.clone(), config)
    }
}

/// Hide the password part of a connection URL for logging
pub fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let creds = &url[scheme_end + 3..at];
            match creds.find(':') {
                Some(colon) => format!(
                    "{}{}:****{}",
                    &url[..scheme_end + 3],
                    &creds[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

pub struct PgPlaceStore {
    pool: PgPool,
    source: SourceConfig,
    target_table: String,
}

impl PgPlaceStore {
    /// `config` must have passed [`Config::validate`]; its identifiers are
    /// interpolated into SQL.
    pub fn new(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            source: config.source.clone(),
            target_table: config.target.table.clone(),
        }
    }
}

#[async_trait]
impl PlaceStore for PgPlaceStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        debug!("Opened run transaction");
        Ok(Box::new(PgUnitOfWork {
            tx,
            source: self.source.clone(),
            target_table: self.target_table.clone(),
            cursor: CursorState::default(),
            buffer: VecDeque::new(),
        }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    source: SourceConfig,
    target_table: String,
    cursor: CursorState,
    buffer: VecDeque<(Shape, SourceRow)>,
}

/// Next command the row source has to send to drain the relations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorStep {
    Declare(Shape),
    Fetch(Shape),
    Close(Shape),
    Exhausted,
}

/// Walks the source relations in [`Shape::READ_ORDER`], one cursor at a time
#[derive(Debug, Default)]
struct CursorState {
    shape_idx: usize,
    open: bool,
    drained: bool,
}

impl CursorState {
    fn next_step(&self) -> CursorStep {
        match Shape::READ_ORDER.get(self.shape_idx) {
            None => CursorStep::Exhausted,
            Some(&shape) if !self.open => CursorStep::Declare(shape),
            Some(&shape) if self.drained => CursorStep::Close(shape),
            Some(&shape) => CursorStep::Fetch(shape),
        }
    }

    fn declared(&mut self) {
        self.open = true;
        self.drained = false;
    }

    /// An empty batch means the cursor is exhausted
    fn fetched(&mut self, rows: usize) {
        self.drained = rows == 0;
    }

    fn closed(&mut self) {
        self.open = false;
        self.drained = false;
        self.shape_idx += 1;
    }
}

fn cursor_name(shape: Shape) -> String {
    format!("compositor_{}_cursor", shape.as_str())
}

fn declare_cursor_sql(source: &SourceConfig, shape: Shape) -> String {
    format!(
        "DECLARE {cursor} NO SCROLL CURSOR FOR \
         SELECT name, osm_id, mapping_key, subclass, hstore_to_jsonb(tags) AS tags \
         FROM {relation} \
         WHERE {relevance} = TRUE",
        cursor = cursor_name(shape),
        relation = source.relation(shape),
        relevance = source.relevance_column,
    )
}

fn fetch_batch_sql(source: &SourceConfig, shape: Shape) -> String {
    format!(
        "FETCH FORWARD {} FROM {}",
        source.fetch_batch_size,
        cursor_name(shape)
    )
}

fn close_cursor_sql(shape: Shape) -> String {
    format!("CLOSE {}", cursor_name(shape))
}

// A bare `&str` carries no arguments, so sqlx sends it over the simple query
// protocol. The cursor commands rely on that.
async fn execute_simple(conn: &mut PgConnection, sql: &str) -> Result<()> {
    conn.execute(sql).await?;
    Ok(())
}

async fn fetch_simple(conn: &mut PgConnection, sql: &str) -> Result<Vec<PgRow>> {
    Ok(conn.fetch_all(sql).await?)
}

/// hstore allows NULL values; a NULL-valued key carries no information
fn tags_from_hstore(tags: Option<BTreeMap<String, Option<String>>>) -> RawTagSet {
    tags.map(|map| {
        map.into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect()
    })
    .unwrap_or_default()
}

/// A NULL `name` becomes the empty string
fn source_row_from_columns(
    name: Option<String>,
    external_id: ExternalId,
    mapping_key: String,
    subclass: String,
    tags: Option<BTreeMap<String, Option<String>>>,
) -> SourceRow {
    SourceRow {
        name: name.unwrap_or_default(),
        external_id,
        mapping_key,
        subclass,
        tags: tags_from_hstore(tags),
    }
}

fn decode_source_row(row: &PgRow) -> Result<SourceRow> {
    let tags: Option<Json<BTreeMap<String, Option<String>>>> = row.try_get("tags")?;
    Ok(source_row_from_columns(
        row.try_get("name")?,
        row.try_get("osm_id")?,
        row.try_get("mapping_key")?,
        row.try_get("subclass")?,
        tags.map(|Json(map)| map),
    ))
}

#[async_trait]
impl RowSource for PgUnitOfWork {
    async fn next_row(&mut self) -> Result<Option<(Shape, SourceRow)>> {
        loop {
            if let Some(next) = self.buffer.pop_front() {
                return Ok(Some(next));
            }
            match self.cursor.next_step() {
                CursorStep::Declare(shape) => {
                    let sql = declare_cursor_sql(&self.source, shape);
                    execute_simple(&mut self.tx, &sql).await?;
                    self.cursor.declared();
                    debug!(origin = %shape, "Declared source cursor");
                }
                CursorStep::Fetch(shape) => {
                    let sql = fetch_batch_sql(&self.source, shape);
                    let rows = fetch_simple(&mut self.tx, &sql).await?;
                    self.cursor.fetched(rows.len());
                    for row in &rows {
                        self.buffer.push_back((shape, decode_source_row(row)?));
                    }
                }
                CursorStep::Close(shape) => {
                    execute_simple(&mut self.tx, &close_cursor_sql(shape)).await?;
                    self.cursor.closed();
                    debug!(origin = %shape, "Closed source cursor");
                }
                CursorStep::Exhausted => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl PlaceSink for PgUnitOfWork {
    async fn upsert_place(
        &mut self,
        shape: Shape,
        record: &ClassifiedRecord,
    ) -> Result<Option<PlaceId>> {
        let sql = upsert_sql(&self.target_table, &self.source.relation(shape));
        let address = record.address_columns();

        let row = sqlx::query(&sql)
            .bind(record.external_id)
            .bind(&record.display_name)
            .bind(record.display_class.map(|c| c.as_str()))
            .bind(record.status.as_deref())
            .bind(record.website.as_deref())
            .bind(record.phone.as_deref())
            .bind(address.street_number)
            .bind(address.street_name)
            .bind(address.unit_number)
            .bind(address.neighborhood)
            .bind(address.city)
            .bind(address.state)
            .bind(address.country)
            .bind(address.postal_code)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("place_id")?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        info!("Committed run transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        info!("Rolled back run transaction");
        Ok(())
    }
}

/// Upsert keyed on `osm_id`. The geometry is selected from the origin
/// relation, so a vanished origin row makes the statement insert nothing.
/// Every column is overwritten on conflict.
pub fn upsert_sql(target_table: &str, origin_relation: &str) -> String {
    format!(
        "INSERT INTO {target_table} (
            osm_id,
            identity_name,
            identity_display_class,
            status,
            locator_point,
            locator_website,
            locator_phone,
            locator_address_street_number,
            locator_address_street_name,
            locator_address_unit_number,
            locator_address_neighborhood,
            locator_address_city,
            locator_address_state,
            locator_address_country,
            locator_address_postal_code)
        SELECT $1, $2, $3, $4, src_table.geometry, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14
            FROM {origin_relation} src_table
            WHERE src_table.osm_id = $1
        ON CONFLICT (osm_id) DO UPDATE
            SET identity_name = EXCLUDED.identity_name,
                identity_display_class = EXCLUDED.identity_display_class,
                status = EXCLUDED.status,
                locator_point = EXCLUDED.locator_point,
                locator_website = EXCLUDED.locator_website,
                locator_phone = EXCLUDED.locator_phone,
                locator_address_street_number = EXCLUDED.locator_address_street_number,
                locator_address_street_name = EXCLUDED.locator_address_street_name,
                locator_address_unit_number = EXCLUDED.locator_address_unit_number,
                locator_address_neighborhood = EXCLUDED.locator_address_neighborhood,
                locator_address_city = EXCLUDED.locator_address_city,
                locator_address_state = EXCLUDED.locator_address_state,
                locator_address_country = EXCLUDED.locator_address_country,
                locator_address_postal_code = EXCLUDED.locator_address_postal_code
        RETURNING place_id"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_database_url() {
        assert_eq!(
            mask_database_url("postgresql://postgres:secret@db:5432/gis"),
            "postgresql://postgres:****@db:5432/gis"
        );
        assert_eq!(mask_database_url("postgresql://db/gis"), "postgresql://db/gis");
    }

    #[test]
    fn test_upsert_sql_joins_origin_relation() {
        let sql = upsert_sql("app_placedata.places", "mapdata_prod.osm_poi_polygon");
        assert!(sql.starts_with("INSERT INTO app_placedata.places"));
        assert!(sql.contains("FROM mapdata_prod.osm_poi_polygon src_table"));
        assert!(sql.contains("ON CONFLICT (osm_id) DO UPDATE"));
        assert!(sql.contains("$14"));
        assert!(sql.trim_end().ends_with("RETURNING place_id"));
    }

    #[test]
    fn test_cursor_names_are_distinct() {
        assert_ne!(cursor_name(Shape::Point), cursor_name(Shape::Polygon));
    }

    #[test]
    fn test_cursor_sql_uses_configured_relation() {
        let source = SourceConfig::default();
        let declare = declare_cursor_sql(&source, Shape::Polygon);
        assert!(declare.starts_with("DECLARE compositor_polygon_cursor NO SCROLL CURSOR FOR"));
        assert!(declare.contains(&format!("FROM {}", source.relation(Shape::Polygon))));
        assert!(declare.contains("hstore_to_jsonb(tags) AS tags"));
        assert!(declare.ends_with(&format!("WHERE {} = TRUE", source.relevance_column)));

        assert_eq!(
            fetch_batch_sql(&source, Shape::Point),
            format!("FETCH FORWARD {} FROM compositor_point_cursor", source.fetch_batch_size)
        );
        assert_eq!(close_cursor_sql(Shape::Point), "CLOSE compositor_point_cursor");
    }

    /// Drive the cursor state with the given batch sizes per relation and
    /// record every command it asks for.
    fn drain_steps(batches: &[&[usize]]) -> Vec<CursorStep> {
        let mut state = CursorState::default();
        let mut batches = batches.iter().map(|b| b.iter().copied());
        let mut current = batches.next();
        let mut steps = Vec::new();
        loop {
            let step = state.next_step();
            steps.push(step);
            match step {
                CursorStep::Declare(_) => state.declared(),
                CursorStep::Fetch(_) => {
                    let rows = current.as_mut().and_then(|b| b.next()).unwrap_or(0);
                    state.fetched(rows);
                }
                CursorStep::Close(_) => {
                    state.closed();
                    current = batches.next();
                }
                CursorStep::Exhausted => return steps,
            }
        }
    }

    #[test]
    fn test_cursor_drains_points_before_polygons() {
        let steps = drain_steps(&[&[500, 3], &[2]]);
        assert_eq!(
            steps,
            vec![
                CursorStep::Declare(Shape::Point),
                CursorStep::Fetch(Shape::Point),
                CursorStep::Fetch(Shape::Point),
                CursorStep::Fetch(Shape::Point),
                CursorStep::Close(Shape::Point),
                CursorStep::Declare(Shape::Polygon),
                CursorStep::Fetch(Shape::Polygon),
                CursorStep::Fetch(Shape::Polygon),
                CursorStep::Close(Shape::Polygon),
                CursorStep::Exhausted,
            ]
        );
    }

    #[test]
    fn test_empty_relation_is_declared_and_closed() {
        let steps = drain_steps(&[&[], &[]]);
        assert_eq!(
            steps,
            vec![
                CursorStep::Declare(Shape::Point),
                CursorStep::Fetch(Shape::Point),
                CursorStep::Close(Shape::Point),
                CursorStep::Declare(Shape::Polygon),
                CursorStep::Fetch(Shape::Polygon),
                CursorStep::Close(Shape::Polygon),
                CursorStep::Exhausted,
            ]
        );
    }

    #[test]
    fn test_null_valued_hstore_keys_are_dropped() {
        let hstore = BTreeMap::from([
            ("phone".to_string(), Some("+1 212 555 0100".to_string())),
            ("website".to_string(), None),
        ]);
        let tags = tags_from_hstore(Some(hstore));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("phone").map(String::as_str), Some("+1 212 555 0100"));
        assert!(tags_from_hstore(None).is_empty());
    }

    #[test]
    fn test_null_name_decodes_to_empty_string() {
        let row = source_row_from_columns(
            None,
            -42,
            "shop".to_string(),
            "bakery".to_string(),
            None,
        );
        assert_eq!(row.name, "");
        assert_eq!(row.external_id, -42);
        assert!(row.tags.is_empty());
    }

    #[test]
    fn test_unit_of_work_is_sendable() {
        fn assert_unit_of_work<T: UnitOfWork>() {}
        assert_unit_of_work::<PgUnitOfWork>();
    }
}
