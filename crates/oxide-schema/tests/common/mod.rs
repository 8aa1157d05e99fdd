#![allow(dead_code)]

use std::collections::VecDeque;

use oxide_schema::{
    BindArg, Column, ExecutorConfig, ExecutorError, ForeignKeyAction, MemoryCursor, RowCursor,
    SqlExecutor, Table, Value,
};
use rusqlite::types::{Value as SqliteValue, ValueRef as SqliteValueRef};
use rusqlite::{params_from_iter, Connection};

/// Installs a test-writer subscriber so `tracing` output shows up in
/// failing tests. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// =============================================================================
// Music schema
// =============================================================================

pub struct Artist {
    pub table: Table,
    pub id: Column<i64>,
    pub name: Column<String>,
}

pub struct Album {
    pub table: Table,
    pub id: Column<i64>,
    pub name: Column<String>,
    pub artist_id: Column<i64>,
    pub year: Column<Option<i64>>,
}

pub struct ArtistAlbum {
    pub table: Table,
    pub artist_id: Column<i64>,
    pub album_id: Column<i64>,
}

pub struct MediaFile {
    pub table: Table,
    pub id: Column<i64>,
    pub title: Column<String>,
    pub album_id: Column<i64>,
    pub artist_id: Column<i64>,
    pub duration: Column<Option<f64>>,
}

pub struct Music {
    pub artist: Artist,
    pub album: Album,
    pub artist_album: ArtistAlbum,
    pub media_file: MediaFile,
}

impl Music {
    pub fn new() -> Self {
        let mut builder = Table::builder("Artist");
        let id = builder.long("_id", |c| c.primary_key()).unwrap();
        let name = builder
            .text("ArtistName", |c| c.collate_no_case().unique_index())
            .unwrap();
        let artist = Artist {
            table: builder.build().unwrap(),
            id,
            name,
        };

        let mut builder = Table::builder("Album");
        let id = builder.long("_id", |c| c.primary_key()).unwrap();
        let name = builder.text("AlbumName", |c| c).unwrap();
        let artist_id = builder
            .long("ArtistId", |c| {
                c.references(&artist.id)
                    .on_delete(ForeignKeyAction::Cascade)
                    .index()
            })
            .unwrap();
        let year = builder.opt_long("Year", |c| c).unwrap();
        let album = Album {
            table: builder.build().unwrap(),
            id,
            name,
            artist_id,
            year,
        };

        let mut builder = Table::builder("ArtistAlbum");
        let aa_artist = builder
            .long("ArtistId", |c| {
                c.references(&artist.id).on_delete(ForeignKeyAction::Cascade)
            })
            .unwrap();
        let aa_album = builder
            .long("AlbumId", |c| {
                c.references(&album.id).on_delete(ForeignKeyAction::Cascade)
            })
            .unwrap();
        builder.primary_key(&[&aa_artist, &aa_album]).unwrap();
        let artist_album = ArtistAlbum {
            table: builder.build().unwrap(),
            artist_id: aa_artist,
            album_id: aa_album,
        };

        let mut builder = Table::builder("MediaFile");
        let id = builder.long("_id", |c| c.primary_key()).unwrap();
        let title = builder.text("MediaTitle", |c| c).unwrap();
        let album_id = builder
            .long("AlbumId", |c| {
                c.references(&album.id).on_delete(ForeignKeyAction::Cascade)
            })
            .unwrap();
        let artist_id = builder
            .long("ArtistId", |c| {
                c.references(&artist.id).on_delete(ForeignKeyAction::Cascade)
            })
            .unwrap();
        let duration = builder.opt_real("Duration", |c| c).unwrap();
        let media_file = MediaFile {
            table: builder.build().unwrap(),
            id,
            title,
            album_id,
            artist_id,
            duration,
        };

        Self {
            artist,
            album,
            artist_album,
            media_file,
        }
    }

    /// Every table, deliberately out of dependency order.
    pub fn tables(&self) -> Vec<&Table> {
        vec![
            &self.media_file.table,
            &self.artist_album.table,
            &self.album.table,
            &self.artist.table,
        ]
    }
}

// =============================================================================
// Recording executor
// =============================================================================

/// Records every call and answers queries from a queue of canned results.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub statements: Vec<(String, Vec<BindArg>)>,
    pub queries: Vec<(String, Vec<BindArg>)>,
    pub results: VecDeque<Vec<Vec<Value>>>,
}

impl RecordingExecutor {
    pub fn with_results(results: Vec<Vec<Vec<Value>>>) -> Self {
        Self {
            results: results.into(),
            ..Self::default()
        }
    }

    pub fn statement_sql(&self) -> Vec<&str> {
        self.statements.iter().map(|(sql, _)| sql.as_str()).collect()
    }
}

impl SqlExecutor for RecordingExecutor {
    fn exec(&mut self, sql: &str, args: &[BindArg]) -> Result<u64, ExecutorError> {
        self.statements.push((sql.to_owned(), args.to_vec()));
        Ok(1)
    }

    fn query(
        &mut self,
        sql: &str,
        args: &[BindArg],
    ) -> Result<Box<dyn RowCursor + '_>, ExecutorError> {
        self.queries.push((sql.to_owned(), args.to_vec()));
        let rows = self.results.pop_front().unwrap_or_default();
        Ok(Box::new(MemoryCursor::new(Vec::new(), rows)))
    }
}

// =============================================================================
// SQLite executor
// =============================================================================

/// An in-memory SQLite database behind the executor contract.
pub struct SqliteExecutor {
    conn: Connection,
    config: ExecutorConfig,
}

impl SqliteExecutor {
    pub fn open() -> Self {
        let conn = Connection::open_in_memory().expect("open in-memory database");
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .expect("enable foreign keys");
        Self {
            conn,
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }
}

fn to_sqlite(arg: &BindArg) -> SqliteValue {
    match arg {
        BindArg::Null => SqliteValue::Null,
        BindArg::Text(text) => SqliteValue::Text(text.clone()),
        BindArg::Blob(bytes) => SqliteValue::Blob(bytes.clone()),
    }
}

fn from_sqlite(value: SqliteValueRef<'_>) -> Value {
    match value {
        SqliteValueRef::Null => Value::Null,
        SqliteValueRef::Integer(n) => Value::Integer(n),
        SqliteValueRef::Real(f) => Value::Real(f),
        SqliteValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).into_owned()),
        SqliteValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

impl SqlExecutor for SqliteExecutor {
    fn exec(&mut self, sql: &str, args: &[BindArg]) -> Result<u64, ExecutorError> {
        let changed = self
            .conn
            .execute(sql, params_from_iter(args.iter().map(to_sqlite)))?;
        Ok(u64::try_from(changed)?)
    }

    fn query(
        &mut self,
        sql: &str,
        args: &[BindArg],
    ) -> Result<Box<dyn RowCursor + '_>, ExecutorError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();
        let mut rows = stmt.query(params_from_iter(args.iter().map(to_sqlite)))?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for index in 0..width {
                record.push(from_sqlite(row.get_ref(index)?));
            }
            values.push(record);
        }
        Ok(Box::new(MemoryCursor::new(columns, values)))
    }

    fn config(&self) -> ExecutorConfig {
        self.config
    }
}
