//! Foreign-key ordering over generated schemas.

mod common;

use std::collections::HashMap;

use common::Music;
use oxide_schema::{Column, Table, TableDependencies};
use proptest::prelude::*;

/// Builds `T0..Tn`, where `Ti` references `Tj` for every `edges[i][j]`
/// with `j < i`, so the graph is always acyclic.
fn acyclic_schema(edges: &[Vec<bool>]) -> Vec<Table> {
    let mut ids: Vec<Column<i64>> = Vec::new();
    let mut tables = Vec::new();
    for (i, row) in edges.iter().enumerate() {
        let mut builder = Table::builder(&format!("T{i}"));
        let id = builder.long("_id", |c| c.primary_key()).unwrap();
        for (j, target) in ids.iter().enumerate() {
            if row[j] {
                builder
                    .long(&format!("Ref{j}"), |c| c.references(target))
                    .unwrap();
            }
        }
        tables.push(builder.build().unwrap());
        ids.push(id);
    }
    tables
}

fn schema_strategy() -> impl Strategy<Value = (Vec<Vec<bool>>, Vec<usize>)> {
    (1usize..9).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::collection::vec(any::<bool>(), n), n),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #[test]
    fn prop_creation_order_respects_references((edges, permutation) in schema_strategy()) {
        let tables = acyclic_schema(&edges);
        let input: Vec<&Table> = permutation.iter().map(|&i| &tables[i]).collect();
        let graph = TableDependencies::new(input);
        prop_assert!(!graph.has_cycle());

        let order = graph.creation_order().unwrap();
        prop_assert_eq!(order.len(), tables.len());
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(p, t)| (t.name(), p))
            .collect();
        for (i, row) in edges.iter().enumerate() {
            for (j, &linked) in row.iter().enumerate().take(i) {
                if linked {
                    let (from, to) = (format!("T{i}"), format!("T{j}"));
                    prop_assert!(position[to.as_str()] < position[from.as_str()]);
                }
            }
        }

        let mut reversed = graph.drop_order().unwrap();
        reversed.reverse();
        prop_assert_eq!(reversed, order);
    }

    #[test]
    fn prop_independent_tables_keep_input_order(permutation in Just((0..6).collect::<Vec<usize>>()).prop_shuffle()) {
        let tables = acyclic_schema(&vec![vec![false; 6]; 6]);
        let input: Vec<&Table> = permutation.iter().map(|&i| &tables[i]).collect();
        let order = TableDependencies::new(input.clone()).creation_order().unwrap();
        prop_assert_eq!(order, input);
    }
}

#[test]
fn test_music_dependencies() {
    let m = Music::new();
    let graph = TableDependencies::new(m.tables());
    let names = |tables: Vec<&Table>| tables.iter().map(|t| t.name().to_owned()).collect::<Vec<_>>();
    assert_eq!(names(graph.dependencies_of(&m.media_file.table)), vec!["Album", "Artist"]);
    assert_eq!(names(graph.dependencies_of(&m.artist_album.table)), vec!["Artist", "Album"]);
    assert!(graph.dependencies_of(&m.artist.table).is_empty());
    assert_eq!(
        names(graph.creation_order().unwrap()),
        vec!["Artist", "Album", "MediaFile", "ArtistAlbum"]
    );
}
