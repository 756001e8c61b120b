use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use tracing::debug;

use super::{
    expect_kind, validate_label_name, EdgeRow, GraphStore, LabelInfo, NewEdge, StoreError,
    StoreOptions, StoreResult, VertexRow,
};
use crate::types::{encode, GraphId, LabelId, LabelKind, SEQ_MASK};
use crate::value::{encode_properties, parse_properties, PropertyMap};

const CATALOG_DDL: &str = "CREATE TABLE IF NOT EXISTS graph_labels (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL CHECK (kind IN ('vertex', 'edge')),
    next_seq INTEGER NOT NULL DEFAULT 1
)";

/// Embedded SQLite store: one catalog table plus one table per label.
///
/// Properties are persisted as property-literal text and parsed back on
/// scan. Every batch is a single transaction.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingDatabase`] when the file does not exist
    /// and `create_if_missing` is off.
    pub fn open(path: impl AsRef<Path>, opts: &StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            if !opts.create_if_missing {
                return Err(StoreError::missing_database(path));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)?;
                }
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "synchronous", opts.synchronous.pragma_value())?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(db_path = %path.display(), journal_mode = %mode, "store.sqlite.opened");
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute(CATALOG_DDL, [])?;
        Ok(Self { conn, path })
    }

    fn require(&self, name: &str, kind: LabelKind) -> StoreResult<LabelInfo> {
        let info = self
            .label(name)?
            .ok_or_else(|| StoreError::UnknownLabel(name.to_string()))?;
        expect_kind(&info, kind)?;
        Ok(info)
    }
}

fn table_name(id: LabelId) -> String {
    format!("label_{}", id.0)
}

fn row_to_label(id: i64, name: String, kind: String) -> StoreResult<LabelInfo> {
    let id = u16::try_from(id).map_err(|_| StoreError::Corrupt(format!("label id {id}")))?;
    let kind = LabelKind::from_tag(&kind)
        .ok_or_else(|| StoreError::Corrupt(format!("label kind '{kind}'")))?;
    Ok(LabelInfo {
        id: LabelId(id),
        name,
        kind,
    })
}

fn query_label(conn: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> StoreResult<Option<LabelInfo>> {
    let row = conn
        .prepare_cached(sql)?
        .query_row([key], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .optional()?;
    row.map(|(id, name, kind)| row_to_label(id, name, kind))
        .transpose()
}

/// Reserves `count` sequences for the label and returns the first.
fn reserve(tx: &Transaction<'_>, info: &LabelInfo, count: usize) -> StoreResult<u64> {
    let next: i64 = tx.query_row(
        "SELECT next_seq FROM graph_labels WHERE id = ?1",
        [info.id.0],
        |row| row.get(0),
    )?;
    let first = u64::try_from(next).map_err(|_| StoreError::Corrupt(format!("next_seq {next}")))?;
    let last = first.saturating_add(count as u64).saturating_sub(1);
    if count > 0 && last > SEQ_MASK {
        return Err(StoreError::SequenceExhausted(info.name.clone()));
    }
    set_next_seq(tx, info.id, first + count as u64)?;
    Ok(first)
}

fn set_next_seq(tx: &Transaction<'_>, label: LabelId, next: u64) -> StoreResult<()> {
    tx.execute(
        "UPDATE graph_labels SET next_seq = ?1 WHERE id = ?2",
        params![next as i64, label.0],
    )?;
    Ok(())
}

fn map_constraint(err: rusqlite::Error, id: GraphId) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::DuplicateId(id)
        }
        _ => StoreError::Sqlite(err),
    }
}

fn encode_batch<'a>(props: impl Iterator<Item = &'a PropertyMap>) -> StoreResult<Vec<String>> {
    props
        .map(|p| encode_properties(p).map_err(StoreError::from))
        .collect()
}

impl GraphStore for SqliteStore {
    fn create_label(&mut self, name: &str, kind: LabelKind) -> StoreResult<LabelInfo> {
        validate_label_name(name)?;
        if let Some(existing) = self.label(name)? {
            expect_kind(&existing, kind)?;
            return Ok(existing);
        }
        let tx = self.conn.transaction()?;
        let max: i64 = tx.query_row("SELECT COALESCE(MAX(id), 0) FROM graph_labels", [], |row| {
            row.get(0)
        })?;
        let id = u16::try_from(max + 1).map_err(|_| StoreError::LabelsExhausted)?;
        let info = LabelInfo {
            id: LabelId(id),
            name: name.to_string(),
            kind,
        };
        tx.execute(
            "INSERT INTO graph_labels (id, name, kind) VALUES (?1, ?2, ?3)",
            params![id, name, kind.as_str()],
        )?;
        let table = table_name(info.id);
        match kind {
            LabelKind::Vertex => tx.execute_batch(&format!(
                "CREATE TABLE {table} (id INTEGER PRIMARY KEY, properties TEXT NOT NULL);"
            ))?,
            LabelKind::Edge => tx.execute_batch(&format!(
                "CREATE TABLE {table} (
                    id INTEGER PRIMARY KEY,
                    start_id INTEGER NOT NULL,
                    end_id INTEGER NOT NULL,
                    properties TEXT NOT NULL
                );
                CREATE INDEX {table}_start ON {table} (start_id);"
            ))?,
        }
        tx.commit()?;
        debug!(label = %name, label_id = id, %kind, "store.sqlite.label_created");
        Ok(info)
    }

    fn labels(&self) -> StoreResult<Vec<LabelInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, kind FROM graph_labels ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let mut labels = Vec::new();
        for row in rows {
            let (id, name, kind) = row?;
            labels.push(row_to_label(id, name, kind)?);
        }
        Ok(labels)
    }

    fn label(&self, name: &str) -> StoreResult<Option<LabelInfo>> {
        query_label(
            &self.conn,
            "SELECT id, name, kind FROM graph_labels WHERE name = ?1",
            &name,
        )
    }

    fn label_by_id(&self, id: LabelId) -> StoreResult<Option<LabelInfo>> {
        query_label(
            &self.conn,
            "SELECT id, name, kind FROM graph_labels WHERE id = ?1",
            &id.0,
        )
    }

    fn max_sequence(&self, label: &str) -> StoreResult<u64> {
        let next: i64 = self
            .conn
            .query_row(
                "SELECT next_seq FROM graph_labels WHERE name = ?1",
                [label],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::UnknownLabel(label.to_string()))?;
        Ok(u64::try_from(next - 1).unwrap_or(0))
    }

    fn insert_vertices(
        &mut self,
        label: &str,
        batch: &[&PropertyMap],
    ) -> StoreResult<Vec<GraphId>> {
        let info = self.require(label, LabelKind::Vertex)?;
        let texts = encode_batch(batch.iter().copied())?;
        let tx = self.conn.transaction()?;
        let first = reserve(&tx, &info, batch.len())?;
        let mut ids = Vec::with_capacity(batch.len());
        {
            let sql = format!(
                "INSERT INTO {} (id, properties) VALUES (?1, ?2)",
                table_name(info.id)
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            for (offset, text) in texts.iter().enumerate() {
                let id = encode(info.id, first + offset as u64)
                    .map_err(|_| StoreError::SequenceExhausted(info.name.clone()))?;
                stmt.execute(params![id.0 as i64, text])
                    .map_err(|err| map_constraint(err, id))?;
                ids.push(id);
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn insert_vertices_with_ids(
        &mut self,
        label: &str,
        batch: &[(GraphId, &PropertyMap)],
    ) -> StoreResult<()> {
        let info = self.require(label, LabelKind::Vertex)?;
        if let Some((id, _)) = batch.iter().find(|(id, _)| id.label() != info.id) {
            return Err(StoreError::ForeignId {
                id: *id,
                label: label.to_string(),
            });
        }
        let texts = encode_batch(batch.iter().map(|(_, props)| *props))?;
        let tx = self.conn.transaction()?;
        let mut max_seq = 0u64;
        {
            let sql = format!(
                "INSERT INTO {} (id, properties) VALUES (?1, ?2)",
                table_name(info.id)
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            for ((id, _), text) in batch.iter().zip(&texts) {
                stmt.execute(params![id.0 as i64, text])
                    .map_err(|err| map_constraint(err, *id))?;
                max_seq = max_seq.max(id.sequence());
            }
        }
        tx.execute(
            "UPDATE graph_labels SET next_seq = MAX(next_seq, ?1) WHERE id = ?2",
            params![(max_seq + 1) as i64, info.id.0],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_edges(&mut self, label: &str, batch: &[NewEdge<'_>]) -> StoreResult<usize> {
        let info = self.require(label, LabelKind::Edge)?;
        let texts = encode_batch(batch.iter().map(|edge| edge.properties))?;
        let mut vertex_tables: HashMap<LabelId, Option<String>> = HashMap::new();
        for edge in batch {
            for endpoint in [edge.start, edge.end] {
                let label_id = endpoint.label();
                if !vertex_tables.contains_key(&label_id) {
                    let table = self
                        .label_by_id(label_id)?
                        .filter(|l| l.kind == LabelKind::Vertex)
                        .map(|l| table_name(l.id));
                    vertex_tables.insert(label_id, table);
                }
                let Some(Some(table)) = vertex_tables.get(&label_id) else {
                    return Err(StoreError::MissingVertex(endpoint));
                };
                let exists = self
                    .conn
                    .prepare_cached(&format!("SELECT 1 FROM {table} WHERE id = ?1"))?
                    .exists([endpoint.0 as i64])?;
                if !exists {
                    return Err(StoreError::MissingVertex(endpoint));
                }
            }
        }
        let tx = self.conn.transaction()?;
        let first = reserve(&tx, &info, batch.len())?;
        {
            let sql = format!(
                "INSERT INTO {} (id, start_id, end_id, properties) VALUES (?1, ?2, ?3, ?4)",
                table_name(info.id)
            );
            let mut stmt = tx.prepare_cached(&sql)?;
            for (offset, (edge, text)) in batch.iter().zip(&texts).enumerate() {
                let id = encode(info.id, first + offset as u64)
                    .map_err(|_| StoreError::SequenceExhausted(info.name.clone()))?;
                stmt.execute(params![
                    id.0 as i64,
                    edge.start.0 as i64,
                    edge.end.0 as i64,
                    text
                ])
                .map_err(|err| map_constraint(err, id))?;
            }
        }
        tx.commit()?;
        Ok(batch.len())
    }

    fn scan_vertices(&self, label: &str) -> StoreResult<Vec<VertexRow>> {
        let info = self.require(label, LabelKind::Vertex)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, properties FROM {} ORDER BY id",
            table_name(info.id)
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, text) = row?;
            out.push(VertexRow {
                id: GraphId(id as u64),
                properties: parse_properties(&text)?,
            });
        }
        Ok(out)
    }

    fn scan_edges(&self, label: &str) -> StoreResult<Vec<EdgeRow>> {
        let info = self.require(label, LabelKind::Edge)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, start_id, end_id, properties FROM {} ORDER BY id",
            table_name(info.id)
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, start, end, text) = row?;
            out.push(EdgeRow {
                id: GraphId(id as u64),
                start: GraphId(start as u64),
                end: GraphId(end as u64),
                properties: parse_properties(&text)?,
            });
        }
        Ok(out)
    }
}
