//! Generation enumeration, deletion, and the current-generation pointer.
//!
//! A generation names one cache epoch. Activation flips the single-row
//! pointer and retires every other generation, which is how storage from
//! superseded deployments is reclaimed.

use super::connection::VersionedStore;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl VersionedStore {
    /// List every generation that has at least one record.
    ///
    /// Sorted for deterministic output.
    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT DISTINCT generation FROM records ORDER BY generation")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut generations = Vec::new();
                for row in rows {
                    generations.push(row?);
                }
                Ok(generations)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete all records under a generation.
    ///
    /// Returns the number of deleted records; a no-op (0) if the generation
    /// is absent.
    pub async fn delete_generation(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM records WHERE generation = ?1", params![generation])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Get the current generation, if one has been activated.
    pub async fn current_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result =
                    conn.query_row("SELECT generation FROM current_generation WHERE id = 1", [], |row| row.get(0));

                match result {
                    Ok(generation) => Ok(Some(generation)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Mark a generation as current.
    ///
    /// The pointer is a single CHECK-constrained row, so this replaces any
    /// previous value; two generations can never be current at once.
    pub async fn set_current_generation(&self, generation: &str) -> Result<(), Error> {
        let generation = generation.to_string();
        let activated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO current_generation (id, generation, activated_at) VALUES (1, ?1, ?2)
                ON CONFLICT(id) DO UPDATE SET
                    generation = excluded.generation,
                    activated_at = excluded.activated_at",
                    params![generation, activated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
