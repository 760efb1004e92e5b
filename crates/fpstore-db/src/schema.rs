//! Relations and integrity constraints
//!
//! Both dialects declare the same two tables:
//! - `songs`: one row per imported audio work, unique by name
//! - `fingerprints`: (hash, song, offset) triples, cascading with their song

/// SQL dialect a driver speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Idempotent DDL: creates only what is missing
    pub fn create_sql(self) -> &'static str {
        match self {
            Dialect::Postgres => POSTGRES_CREATE,
            Dialect::Sqlite => SQLITE_CREATE,
        }
    }

    pub fn drop_sql(self) -> &'static str {
        DROP_ALL
    }
}

const POSTGRES_CREATE: &str = "
    CREATE TABLE IF NOT EXISTS songs (
        song_id         BIGSERIAL PRIMARY KEY,
        song_name       TEXT NOT NULL,
        fingerprinted   BOOLEAN NOT NULL DEFAULT FALSE,
        file_sha1       BYTEA NOT NULL CHECK (octet_length(file_sha1) = 20),
        CONSTRAINT songs_name_key UNIQUE (song_name),
        CONSTRAINT songs_name_sha1_key UNIQUE (song_name, file_sha1)
    );

    CREATE TABLE IF NOT EXISTS fingerprints (
        hash            BYTEA NOT NULL CHECK (octet_length(hash) BETWEEN 1 AND 10),
        song_id         BIGINT NOT NULL REFERENCES songs(song_id) ON DELETE CASCADE,
        song_offset     BIGINT NOT NULL CHECK (song_offset >= 0),
        CONSTRAINT fingerprints_unique UNIQUE (hash, song_id, song_offset)
    );

    CREATE INDEX IF NOT EXISTS fingerprints_hash_idx ON fingerprints (hash);
    CREATE INDEX IF NOT EXISTS fingerprints_song_idx ON fingerprints (song_id);
";

const SQLITE_CREATE: &str = "
    CREATE TABLE IF NOT EXISTS songs (
        song_id         INTEGER PRIMARY KEY AUTOINCREMENT,
        song_name       TEXT NOT NULL,
        fingerprinted   INTEGER NOT NULL DEFAULT 0,
        file_sha1       BLOB NOT NULL CHECK (length(file_sha1) = 20),
        CONSTRAINT songs_name_key UNIQUE (song_name),
        CONSTRAINT songs_name_sha1_key UNIQUE (song_name, file_sha1)
    );

    CREATE TABLE IF NOT EXISTS fingerprints (
        hash            BLOB NOT NULL CHECK (length(hash) BETWEEN 1 AND 10),
        song_id         INTEGER NOT NULL REFERENCES songs(song_id) ON DELETE CASCADE,
        song_offset     INTEGER NOT NULL CHECK (song_offset >= 0),
        CONSTRAINT fingerprints_unique UNIQUE (hash, song_id, song_offset)
    );

    CREATE INDEX IF NOT EXISTS fingerprints_hash_idx ON fingerprints (hash);
    CREATE INDEX IF NOT EXISTS fingerprints_song_idx ON fingerprints (song_id);
";

// Children first so the foreign key never dangles
const DROP_ALL: &str = "
    DROP TABLE IF EXISTS fingerprints;
    DROP TABLE IF EXISTS songs;
";

/// `hash IN ($1, ..., $n)` / `hash IN (?, ..., ?)` for a chunk of `n` keys
pub fn in_clause(dialect: Dialect, n: usize) -> String {
    let placeholders: Vec<String> = match dialect {
        Dialect::Postgres => (1..=n).map(|i| format!("${}", i)).collect(),
        Dialect::Sqlite => (0..n).map(|_| "?".to_string()).collect(),
    };
    format!("hash IN ({})", placeholders.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_clause_postgres() {
        assert_eq!(in_clause(Dialect::Postgres, 3), "hash IN ($1, $2, $3)");
    }

    #[test]
    fn test_in_clause_sqlite() {
        assert_eq!(in_clause(Dialect::Sqlite, 2), "hash IN (?, ?)");
    }

    #[test]
    fn test_sqlite_schema_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(Dialect::Sqlite.create_sql()).unwrap();
        conn.execute_batch(Dialect::Sqlite.create_sql()).unwrap();
        conn.execute_batch(Dialect::Sqlite.drop_sql()).unwrap();
        conn.execute_batch(Dialect::Sqlite.drop_sql()).unwrap();
    }
}
