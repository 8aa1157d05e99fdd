//! DDL rendering and schema-object lifecycle against a recording executor.

mod common;

use common::{init_tracing, Music, RecordingExecutor};
use oxide_schema::{
    create_all, drop_all, BindArg, Creatable, Error, ExprExt, Index, MasterType, Table,
    Trigger, TriggerEvent, TriggerTiming, Value, ViewBuilder,
};

// =============================================================================
// Tables
// =============================================================================

#[test]
fn test_music_table_ddl() {
    let m = Music::new();
    assert_eq!(
        m.album.table.ddl(false),
        concat!(
            r#"CREATE TABLE IF NOT EXISTS "Album" ("_id" INTEGER NOT NULL PRIMARY KEY, "AlbumName" TEXT NOT NULL, "#,
            r#""ArtistId" INTEGER NOT NULL, "Year" INTEGER, "#,
            r#"CONSTRAINT "fk_Album_ArtistId__id" FOREIGN KEY ("ArtistId") REFERENCES "Artist"("_id") ON DELETE CASCADE)"#
        )
    );
    assert_eq!(
        m.artist_album.table.ddl(false),
        concat!(
            r#"CREATE TABLE IF NOT EXISTS "ArtistAlbum" ("ArtistId" INTEGER NOT NULL, "AlbumId" INTEGER NOT NULL, "#,
            r#"CONSTRAINT "pk_ArtistAlbum" PRIMARY KEY ("ArtistId", "AlbumId"), "#,
            r#"CONSTRAINT "fk_ArtistAlbum_ArtistId__id" FOREIGN KEY ("ArtistId") REFERENCES "Artist"("_id") ON DELETE CASCADE, "#,
            r#"CONSTRAINT "fk_ArtistAlbum_AlbumId__id" FOREIGN KEY ("AlbumId") REFERENCES "Album"("_id") ON DELETE CASCADE)"#
        )
    );
}

#[test]
fn test_table_indices_follow_table() {
    let m = Music::new();
    let statements: Vec<String> = m
        .album
        .table
        .create_statements(true)
        .iter()
        .map(|seed| seed.sql().to_owned())
        .collect();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with(r#"CREATE TEMP TABLE IF NOT EXISTS "Album""#));
    assert_eq!(
        statements[1],
        r#"CREATE INDEX IF NOT EXISTS "Album_ArtistId" ON "Album"("ArtistId")"#
    );
    let index: &Index = &m.album.table.indices()[0];
    assert_eq!(index.master_type(), MasterType::Index);
    assert!(!index.is_unique());
    assert_eq!(
        index.drop_statements()[0].sql(),
        r#"DROP INDEX IF EXISTS "Album_ArtistId""#
    );
}

#[test]
fn test_named_composite_index() {
    let mut builder = Table::builder("MediaFile");
    let album = builder.long("AlbumId", |c| c).unwrap();
    let track = builder.integer("Track", |c| c).unwrap();
    builder
        .named_index("media_by_track", &[&album, &track], true)
        .unwrap();
    let table = builder.build().unwrap();
    assert_eq!(
        table.indices()[0].ddl(),
        r#"CREATE UNIQUE INDEX IF NOT EXISTS "media_by_track" ON "MediaFile"("AlbumId", "Track")"#
    );
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_create_all_runs_in_dependency_order() {
    init_tracing();
    let m = Music::new();
    let mut executor = RecordingExecutor::default();
    create_all(&mut executor, m.tables()).unwrap();
    let created: Vec<&str> = executor
        .statement_sql()
        .into_iter()
        .map(|sql| sql.split(" (").next().unwrap_or(sql))
        .collect();
    assert_eq!(
        created,
        vec![
            r#"CREATE TABLE IF NOT EXISTS "Artist""#,
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "Artist_ArtistName_unique" ON "Artist"("ArtistName")"#,
            r#"CREATE TABLE IF NOT EXISTS "Album""#,
            r#"CREATE INDEX IF NOT EXISTS "Album_ArtistId" ON "Album"("ArtistId")"#,
            r#"CREATE TABLE IF NOT EXISTS "MediaFile""#,
            r#"CREATE TABLE IF NOT EXISTS "ArtistAlbum""#,
        ]
    );
    assert!(executor.statements.iter().all(|(_, args)| args.is_empty()));
}

#[test]
fn test_drop_all_runs_in_reverse_order() {
    let m = Music::new();
    let mut executor = RecordingExecutor::default();
    drop_all(&mut executor, m.tables()).unwrap();
    assert_eq!(
        executor.statement_sql(),
        vec![
            r#"DROP TABLE IF EXISTS "ArtistAlbum""#,
            r#"DROP TABLE IF EXISTS "MediaFile""#,
            r#"DROP TABLE IF EXISTS "Album""#,
            r#"DROP TABLE IF EXISTS "Artist""#,
        ]
    );
}

#[test]
fn test_cycle_is_reported_before_any_statement() {
    let mut a = Table::builder("A");
    let a_id = a.long("_id", |c| c.primary_key()).unwrap();
    let mut b = Table::builder("B");
    let b_id = b.long("_id", |c| c.primary_key()).unwrap();
    a.long("b", |c| c.references(&b_id)).unwrap();
    b.long("a", |c| c.references(&a_id)).unwrap();
    let (a, b) = (a.build().unwrap(), b.build().unwrap());

    let mut executor = RecordingExecutor::default();
    let err = create_all(&mut executor, [&a, &b]).unwrap_err();
    match err {
        Error::CyclicDependency(cycle) => assert_eq!(cycle.tables, vec!["A", "B", "A"]),
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert!(executor.statements.is_empty());
}

#[test]
fn test_exists_queries_sqlite_master() {
    let m = Music::new();
    let mut executor = RecordingExecutor::with_results(vec![
        vec![vec![Value::Integer(1)]],
        vec![vec![Value::Integer(0)]],
    ]);
    assert!(m.artist.table.exists(&mut executor).unwrap());
    assert!(!m.album.table.indices()[0].exists(&mut executor).unwrap());
    assert_eq!(
        executor.queries[0],
        (
            String::from("SELECT COUNT(*) FROM sqlite_master WHERE type = ? AND name = ?"),
            vec![
                BindArg::Text(String::from("table")),
                BindArg::Text(String::from("Artist")),
            ]
        )
    );
    assert_eq!(
        executor.queries[1].1,
        vec![
            BindArg::Text(String::from("index")),
            BindArg::Text(String::from("Album_ArtistId")),
        ]
    );
}

// =============================================================================
// Views and triggers
// =============================================================================

#[test]
fn test_view_lifecycle_statements() {
    let m = Music::new();
    let view = ViewBuilder::new(
        "RecentAlbums",
        &m.album
            .table
            .select(&[&m.album.name])
            .where_clause(m.album.year.ge(2000)),
    )
    .build()
    .unwrap();
    let mut executor = RecordingExecutor::default();
    view.create(&mut executor, false).unwrap();
    view.drop(&mut executor).unwrap();
    assert_eq!(
        executor.statement_sql(),
        vec![
            r#"CREATE VIEW IF NOT EXISTS "RecentAlbums" AS SELECT "Album"."AlbumName" FROM "Album" WHERE "Album"."Year" >= 2000"#,
            r#"DROP VIEW IF EXISTS "RecentAlbums""#,
        ]
    );
}

#[test]
fn test_cleanup_trigger_ddl() {
    let m = Music::new();
    let trigger = Trigger::builder(
        "album_cleanup",
        &m.album.table,
        TriggerTiming::After,
        TriggerEvent::Delete,
    )
    .build(|body| {
        let old_id = body.old_ref(&m.album.id)?;
        body.delete(
            &m.media_file
                .table
                .delete()
                .where_clause(m.media_file.album_id.eq(&old_id)),
        )?;
        body.delete(
            &m.artist_album
                .table
                .delete()
                .where_clause(m.artist_album.album_id.eq(old_id)),
        )?;
        Ok(())
    })
    .unwrap();
    assert_eq!(trigger.master_type(), MasterType::Trigger);
    assert_eq!(
        trigger.ddl(false),
        concat!(
            r#"CREATE TRIGGER IF NOT EXISTS "album_cleanup" AFTER DELETE ON "Album" BEGIN "#,
            r#"DELETE FROM "MediaFile" WHERE "MediaFile"."AlbumId" = OLD."_id"; "#,
            r#"DELETE FROM "ArtistAlbum" WHERE "ArtistAlbum"."AlbumId" = OLD."_id"; END"#
        )
    );
}
