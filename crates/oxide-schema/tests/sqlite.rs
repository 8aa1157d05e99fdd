//! End-to-end runs against an in-memory SQLite database.

mod common;

use common::{init_tracing, Music, SqliteExecutor};
use oxide_schema::{
    bind, create_all, describe_table, drop_all, Creatable, Error, ExecutorConfig, ExprExt,
    FieldType, Join, Query, SortOrder, StatementSeed, Trigger, TriggerEvent, TriggerTiming,
    TypeError, ViewBuilder,
};

fn music_db() -> (Music, SqliteExecutor) {
    init_tracing();
    let m = Music::new();
    let mut db = SqliteExecutor::open();
    create_all(&mut db, m.tables()).unwrap();
    (m, db)
}

fn insert_artist(m: &Music, db: &mut SqliteExecutor, name: &str) -> i64 {
    let seed = m
        .artist
        .table
        .insert()
        .values(|v| {
            v.bind(&m.artist.name);
        })
        .unwrap();
    seed.execute(db, |args| {
        args.set(0, name)?;
        Ok(())
    })
    .unwrap();
    m.artist
        .table
        .select(&[&m.artist.id])
        .where_clause(m.artist.name.eq(bind()))
        .to_query()
        .first(
            db,
            |args| {
                args.set(0, name)?;
                Ok(())
            },
            |c| c.get(&m.artist.id),
        )
        .unwrap()
        .unwrap()
}

fn insert_album(
    m: &Music,
    db: &mut SqliteExecutor,
    artist: i64,
    name: &str,
    year: Option<i64>,
) -> i64 {
    let seed = m
        .album
        .table
        .insert()
        .values(|v| {
            v.bind(&m.album.name).set(&m.album.artist_id, artist).bind(&m.album.year);
        })
        .unwrap();
    seed.execute(db, |args| {
        args.set(0, name)?.set(1, year)?;
        Ok(())
    })
    .unwrap();
    Query::raw(StatementSeed::raw("SELECT last_insert_rowid()"))
        .long_for_query(db, |_| Ok(()))
        .unwrap()
}

#[test]
fn test_schema_objects_exist_and_match_sqlite_master() {
    let (m, mut db) = music_db();
    for table in m.tables() {
        assert!(table.exists(&mut db).unwrap(), "{} missing", table.name());
        let sql = Query::raw(StatementSeed::raw(format!(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = '{}'",
            table.name()
        )))
        .first(&mut db, |_| Ok(()), |c| {
            Ok::<_, TypeError>(c.row().value(0).map(|v| v.to_string()))
        })
        .unwrap()
        .flatten();
        assert_eq!(sql, Some(table.schema_sql()));
    }
    assert!(m.artist.table.indices()[0].exists(&mut db).unwrap());

    drop_all(&mut db, m.tables()).unwrap();
    for table in m.tables() {
        assert!(!table.exists(&mut db).unwrap());
    }
}

#[test]
fn test_describe_table_reads_pragma() {
    let (m, mut db) = music_db();
    let album = describe_table(&mut db, m.album.table.name()).unwrap();
    assert!(album.exists());
    let names: Vec<&str> = album.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["_id", "AlbumName", "ArtistId", "Year"]);

    let id = album.column("_id").unwrap();
    assert_eq!(id.field_type, FieldType::Integer);
    assert_eq!(id.pk_index, 1);
    let year = album.column("Year").unwrap();
    assert!(!year.not_null);
    assert_eq!(year.pk_index, 0);
    assert_eq!(album.column("AlbumName").unwrap().field_type, FieldType::Text);

    let link = describe_table(&mut db, m.artist_album.table.name()).unwrap();
    let pk: Vec<i64> = link.columns.iter().map(|c| c.pk_index).collect();
    assert_eq!(pk, vec![1, 2]);

    assert!(!describe_table(&mut db, "Nowhere").unwrap().exists());
}

#[test]
fn test_insert_select_update_delete() {
    let (m, mut db) = music_db();
    let waits = insert_artist(&m, &mut db, "Tom Waits");
    let cave = insert_artist(&m, &mut db, "Nick Cave");
    insert_album(&m, &mut db, waits, "Rain Dogs", Some(1985));
    insert_album(&m, &mut db, waits, "Bone Machine", Some(1992));
    insert_album(&m, &mut db, cave, "Untitled", None);

    // NOCASE collation on the name
    let found = m
        .artist
        .table
        .select(&[&m.artist.id])
        .where_clause(m.artist.name.eq("tom waits"))
        .to_query()
        .first(&mut db, |_| Ok(()), |c| c.get(&m.artist.id))
        .unwrap();
    assert_eq!(found, Some(waits));

    let query = Join::new(&m.album.table)
        .inner_join(&m.artist.table)
        .unwrap()
        .select(&[&m.album.name, &m.album.year, &m.artist.name])
        .where_clause(m.artist.id.eq(bind()))
        .order_by(&m.album.year, SortOrder::Desc)
        .to_query();
    let albums = query
        .collect(
            &mut db,
            |args| {
                args.set(0, waits)?;
                Ok(())
            },
            |c| -> Result<_, TypeError> {
                Ok((c.get(&m.album.name)?, c.get(&m.album.year)?, c.get(&m.artist.name)?))
            },
        )
        .unwrap();
    assert_eq!(
        albums,
        vec![
            (String::from("Bone Machine"), Some(1992), String::from("Tom Waits")),
            (String::from("Rain Dogs"), Some(1985), String::from("Tom Waits")),
        ]
    );
    let count = query
        .count(&mut db, |args| {
            args.set(0, waits)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(count, 2);

    let changed = m
        .album
        .table
        .update()
        .set(|v| {
            v.set_expr(&m.album.year, m.album.year.coalesce(2000).plus(1));
        })
        .unwrap()
        .where_clause(m.album.artist_id.eq(bind()))
        .build()
        .execute(&mut db, |args| {
            args.set(0, cave)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(changed, 1);
    let years = m
        .album
        .table
        .select(&[&m.album.year])
        .where_clause(m.album.artist_id.eq(cave))
        .to_query()
        .collect(&mut db, |_| Ok(()), |c| c.get(&m.album.year))
        .unwrap();
    assert_eq!(years, vec![Some(2001)]);

    let deleted = m
        .album
        .table
        .delete_where(m.album.year.lt(bind()))
        .execute(&mut db, |args| {
            args.set(0, 1990)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(deleted, 1);
    let remaining = m.album.table.select(&[]).to_query().count(&mut db, |_| Ok(())).unwrap();
    assert_eq!(remaining, 2);
}

#[test]
fn test_foreign_key_cascade() {
    let (m, mut db) = music_db();
    let waits = insert_artist(&m, &mut db, "Tom Waits");
    let album = insert_album(&m, &mut db, waits, "Rain Dogs", Some(1985));
    m.artist_album
        .table
        .insert()
        .values(|v| {
            v.set(&m.artist_album.artist_id, waits)
                .set(&m.artist_album.album_id, album);
        })
        .unwrap()
        .run(&mut db)
        .unwrap();

    m.artist
        .table
        .delete_where(m.artist.id.eq(waits))
        .run(&mut db)
        .unwrap();
    for table in [&m.album.table, &m.artist_album.table] {
        let rows = table.select_all().to_query().count(&mut db, |_| Ok(())).unwrap();
        assert_eq!(rows, 0, "{} not emptied", table.name());
    }

    // Violations surface as executor errors
    let err = m
        .album
        .table
        .insert()
        .values(|v| {
            v.set(&m.album.name, "Orphan").set(&m.album.artist_id, 999);
        })
        .unwrap()
        .run(&mut db)
        .unwrap_err();
    assert!(matches!(err, Error::Executor(_)));
}

#[test]
fn test_trigger_and_view() {
    let (m, mut db) = music_db();
    let trigger = Trigger::builder(
        "album_rename",
        &m.artist.table,
        TriggerTiming::After,
        TriggerEvent::Update,
    )
    .update_of(&[&m.artist.name])
    .build(|body| {
        let new_name = body.new_ref(&m.artist.name)?;
        let old_name = body.old_ref(&m.artist.name)?;
        body.when(&new_name.ne(&old_name))?;
        let id = body.new_ref(&m.artist.id)?;
        let update = m
            .album
            .table
            .update()
            .set(|v| {
                v.set_expr(&m.album.name, m.album.name.concat(" - ").concat(&new_name));
            })?
            .where_clause(m.album.artist_id.eq(id));
        body.update(&update)?;
        Ok(())
    })
    .unwrap();
    trigger.create(&mut db, false).unwrap();
    assert!(trigger.exists(&mut db).unwrap());

    let waits = insert_artist(&m, &mut db, "Tom Waits");
    insert_album(&m, &mut db, waits, "Rain Dogs", Some(1985));
    m.artist
        .table
        .update()
        .set(|v| {
            v.set(&m.artist.name, "T. Waits");
        })
        .unwrap()
        .where_clause(m.artist.id.eq(waits))
        .build()
        .run(&mut db)
        .unwrap();

    let title = m.album.name.upper();
    let mut builder = ViewBuilder::new(
        "AlbumTitles",
        &m.album.table.select(&[&m.album.id, &title, &m.album.year]),
    );
    let view_title = builder.column("Title", &title);
    let view_year = builder.column("Released", &m.album.year);
    let view_id = builder.column("AlbumId", &m.album.id);
    let view = builder.build().unwrap();
    view.create(&mut db, false).unwrap();
    assert!(view.exists(&mut db).unwrap());

    let titles = view
        .select(&[&view_title])
        .where_clause(view_id.gt(0))
        .to_query()
        .collect(&mut db, |_| Ok(()), |c| c.get(&view_title))
        .unwrap();
    assert_eq!(titles, vec![String::from("RAIN DOGS - T. WAITS")]);
    let released = view
        .select(&[&view_year, &view_id])
        .to_query()
        .first(&mut db, |_| Ok(()), |c| c.get(&view_year))
        .unwrap();
    assert_eq!(released, Some(Some(1985)));

    view.drop(&mut db).unwrap();
    trigger.drop(&mut db).unwrap();
    assert!(!view.exists(&mut db).unwrap());
    assert!(!trigger.exists(&mut db).unwrap());
}

#[test]
fn test_query_plan_logging_runs_explain() {
    init_tracing();
    let m = Music::new();
    let mut db = SqliteExecutor::open().with_config(ExecutorConfig::new().with_query_plans(true));
    create_all(&mut db, m.tables()).unwrap();
    let rows = m
        .artist
        .table
        .select(&[&m.artist.name])
        .where_clause(m.artist.name.like("T%"))
        .to_query()
        .collect(&mut db, |_| Ok(()), |c| c.get(&m.artist.name))
        .unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_real_extremes_survive_storage() {
    let (m, mut db) = music_db();
    let waits = insert_artist(&m, &mut db, "Tom Waits");
    let album = insert_album(&m, &mut db, waits, "Rain Dogs", Some(1985));
    let file = &m.media_file;
    let durations = [f64::INFINITY, f64::NEG_INFINITY, 5e-324, 1.797e308];

    for (i, duration) in durations.iter().enumerate() {
        let seed = file
            .table
            .insert()
            .values(|v| {
                v.set(&file.title, format!("Track {i}"))
                    .set(&file.album_id, album)
                    .set(&file.artist_id, waits)
                    .bind(&file.duration);
            })
            .unwrap();
        seed.execute(&mut db, |args| {
            args.set(0, *duration)?;
            Ok(())
        })
        .unwrap();
    }

    let stored = file
        .table
        .select(&[&file.duration])
        .order_by(&file.id, SortOrder::Asc)
        .to_query()
        .collect(&mut db, |_| Ok(()), |c| c.get(&file.duration))
        .unwrap();
    let expected: Vec<Option<f64>> = durations.iter().copied().map(Some).collect();
    assert_eq!(stored, expected);

    // The literal form matches the bound one
    let infinite = file
        .table
        .select(&[])
        .where_clause(file.duration.eq(f64::INFINITY))
        .to_query()
        .count(&mut db, |_| Ok(()))
        .unwrap();
    assert_eq!(infinite, 1);
}
