//! INSERT statements.

use crate::error::ConstructionError;
use crate::schema::{OnConflict, Table};

use super::{ColumnValues, SqlBuilder, StatementSeed};

/// An INSERT into one table.
///
/// ```rust
/// use oxide_schema::{Insert, OnConflict, Table};
///
/// let mut builder = Table::builder("Artist");
/// let id = builder.long("_id", |c| c.primary_key()).unwrap();
/// let name = builder.text("ArtistName", |c| c).unwrap();
/// let artist = builder.build().unwrap();
///
/// let seed = Insert::new(&artist)
///     .on_conflict(OnConflict::Ignore)
///     .values(|v| {
///         v.bind(&name).set(&id, 7);
///     })
///     .unwrap();
/// assert_eq!(
///     seed.sql(),
///     r#"INSERT OR IGNORE INTO "Artist" ("ArtistName", "_id") VALUES (?, 7)"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Insert {
    table: Table,
    on_conflict: OnConflict,
}

impl Insert {
    /// Starts an insert into `table`.
    #[must_use]
    pub fn new(table: &Table) -> Self {
        Self {
            table: table.clone(),
            on_conflict: OnConflict::Unspecified,
        }
    }

    /// Sets the conflict resolution (`INSERT OR ...`).
    #[must_use]
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    /// Compiles the insert with the assignments made by `assign`.
    ///
    /// Without assignments the statement inserts `DEFAULT VALUES`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::ForeignColumnAssignment`] when a column
    /// of another table was assigned.
    pub fn values<F>(&self, assign: F) -> Result<StatementSeed, ConstructionError>
    where
        F: FnOnce(&mut ColumnValues),
    {
        let mut values = ColumnValues::new(self.table.identity().clone());
        assign(&mut values);
        let entries = values.finish()?;

        let mut b = SqlBuilder::new();
        b.push(self.on_conflict.insert_keyword())
            .push(" INTO ")
            .push_identity(self.table.identity());
        if entries.is_empty() {
            b.push(" DEFAULT VALUES");
            return Ok(b.into_seed());
        }
        b.push(" (");
        for (i, (column, _)) in entries.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_identity(column);
        }
        b.push(") VALUES (");
        for (i, (_, value)) in entries.iter().enumerate() {
            if i > 0 {
                b.push(", ");
            }
            b.push_node(value);
        }
        b.push(")");
        Ok(b.into_seed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let mut builder = Table::builder("Counter");
        builder.long("_id", |c| c.primary_key()).unwrap();
        let table = builder.build().unwrap();
        let seed = Insert::new(&table).values(|_| {}).unwrap();
        assert_eq!(seed.sql(), r#"INSERT INTO "Counter" DEFAULT VALUES"#);
    }

    #[test]
    fn test_last_assignment_wins() {
        let mut builder = Table::builder("Artist");
        let name = builder.text("ArtistName", |c| c).unwrap();
        let table = builder.build().unwrap();
        let seed = Insert::new(&table)
            .on_conflict(OnConflict::Replace)
            .values(|v| {
                v.set(&name, "first").bind(&name);
            })
            .unwrap();
        assert_eq!(
            seed.sql(),
            r#"INSERT OR REPLACE INTO "Artist" ("ArtistName") VALUES (?)"#
        );
        assert_eq!(seed.arg_count(), 1);
    }

    #[test]
    fn test_foreign_column_rejected() {
        let mut builder = Table::builder("Artist");
        builder.text("ArtistName", |c| c).unwrap();
        let artist = builder.build().unwrap();
        let mut builder = Table::builder("Album");
        let album_name = builder.text("AlbumName", |c| c).unwrap();
        let _album = builder.build().unwrap();

        let err = Insert::new(&artist)
            .values(|v| {
                v.set(&album_name, "Rain Dogs");
            })
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::ForeignColumnAssignment {
                table: String::from("Artist"),
                column: String::from("Album.AlbumName"),
            }
        );
    }
}
