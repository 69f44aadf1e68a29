//! Numbered, checksummed schema migrations for the local store.
//!
//! Version 0 creates the bookkeeping table itself. Every later version runs
//! in its own transaction, and an on-disk database that already holds data
//! is copied aside before the first pending version is applied.

use rusqlite::{params, Connection, OptionalExtension, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.sql.as_bytes()))
    }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 0,
        name: "bootstrap",
        sql: include_str!("migrations/000_bootstrap.sql"),
    },
    Migration {
        version: 1,
        name: "users_and_profiles",
        sql: include_str!("migrations/001_users_and_profiles.sql"),
    },
    Migration {
        version: 2,
        name: "accounts_and_payouts",
        sql: include_str!("migrations/002_accounts_and_payouts.sql"),
    },
    Migration {
        version: 3,
        name: "trades",
        sql: include_str!("migrations/003_trades.sql"),
    },
    Migration {
        version: 4,
        name: "argon2_and_session_kinds",
        sql: include_str!("migrations/004_argon2_and_session_kinds.sql"),
    },
];

pub struct MigrationRunner {
    migrations: &'static [Migration],
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    pub fn new() -> Self {
        Self { migrations: MIGRATIONS }
    }

    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map_or(0, |m| m.version)
    }

    /// Applies every version above the stored one. Returns how many ran,
    /// not counting the bootstrap.
    pub fn run_pending_migrations(&self, conn: &Connection, db_path: &str) -> Result<usize> {
        let current = match self.get_current_version(conn)? {
            Some(version) => version,
            None => {
                log::info!("Fresh database, creating schema_migrations");
                apply(conn, &self.migrations[0])?;
                0
            }
        };

        let pending: Vec<&Migration> = self.migrations.iter().filter(|m| m.version > current).collect();
        let Some(target) = pending.last().map(|m| m.version) else {
            return Ok(0);
        };
        log::info!("Schema at v{}, {} migration(s) pending up to v{}", current, pending.len(), target);

        // A bootstrap-only database has nothing worth keeping
        let backup = if current > 0 {
            Backups::beside(db_path).map(|b| b.snapshot(db_path, target)).transpose()?
        } else {
            None
        };

        for migration in &pending {
            if let Err(e) = apply(conn, migration) {
                log::error!("Migration v{} ({}) failed and was rolled back: {}", migration.version, migration.name, e);
                if let Some(path) = &backup {
                    log::error!("Pre-migration copy: {}", path.display());
                }
                return Err(e);
            }
        }

        Ok(pending.len())
    }

    /// Fails if the SQL of an applied version no longer matches what ran.
    pub fn verify_migrations(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(
            "SELECT version, name, checksum FROM schema_migrations WHERE checksum IS NOT NULL ORDER BY version",
        )?;
        let applied = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>>>()?;

        for (version, name, stored) in applied {
            match self.migrations.iter().find(|m| m.version == version) {
                None => log::warn!("Schema has v{} ({}) which this build does not know", version, name),
                Some(migration) if migration.checksum() != stored => {
                    log::error!(
                        "Migration v{} ({}) changed after it was applied: stored {}, built {}",
                        version,
                        name,
                        stored,
                        migration.checksum()
                    );
                    return Err(rusqlite::Error::InvalidQuery);
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    pub fn get_current_version(&self, conn: &Connection) -> Result<Option<u32>> {
        let tracked: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations')",
            [],
            |row| row.get(0),
        )?;
        if !tracked {
            return Ok(None);
        }

        Ok(conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get::<_, Option<u32>>(0))
            .optional()?
            .flatten())
    }
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let started = Instant::now();

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    let elapsed_ms = started.elapsed().as_millis() as i64;
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms)
         VALUES (?, ?, ?, ?, ?)",
        params![
            migration.version,
            migration.name,
            chrono::Utc::now().timestamp(),
            migration.checksum(),
            elapsed_ms
        ],
    )?;
    tx.commit()?;

    log::info!("Applied v{} ({}) in {}ms", migration.version, migration.name, elapsed_ms);
    Ok(())
}

/// Pre-migration copies kept in a `backups/` directory next to the database.
struct Backups {
    dir: PathBuf,
}

impl Backups {
    const KEEP: usize = 5;
    const PREFIX: &'static str = "pre_migration_v";

    /// None for in-memory databases.
    fn beside(db_path: &str) -> Option<Self> {
        if db_path.is_empty() || db_path == ":memory:" {
            return None;
        }
        let parent = Path::new(db_path).parent().unwrap_or_else(|| Path::new("."));
        Some(Backups {
            dir: parent.join("backups"),
        })
    }

    fn snapshot(&self, db_path: &str, target_version: u32) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| io_failure("create backup directory", e))?;

        let path = self.dir.join(format!(
            "{}{}_{}.db",
            Self::PREFIX,
            target_version,
            chrono::Utc::now().format("%Y%m%d%H%M%S%3f")
        ));

        let src = Connection::open(db_path)?;
        let mut dst = Connection::open(&path)?;
        rusqlite::backup::Backup::new(&src, &mut dst)?.run_to_completion(16, Duration::from_millis(100), None)?;

        let integrity: String = dst.pragma_query_value(None, "integrity_check", |row| row.get(0))?;
        if integrity != "ok" {
            return Err(sqlite_failure(format!("backup {} failed integrity check: {}", path.display(), integrity)));
        }

        log::info!("Database copied to {}", path.display());
        self.prune();
        Ok(path)
    }

    /// Keeps the newest few. Names embed the timestamp, so they sort by age.
    fn prune(&self) {
        let mut names: Vec<String> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
                .filter(|name| name.starts_with(Self::PREFIX) && name.ends_with(".db"))
                .collect(),
            Err(e) => {
                log::warn!("Cannot list {}: {}", self.dir.display(), e);
                return;
            }
        };
        names.sort_by(|a, b| stamp(a).cmp(stamp(b)));

        let excess = names.len().saturating_sub(Self::KEEP);
        for name in &names[..excess] {
            if let Err(e) = fs::remove_file(self.dir.join(name)) {
                log::warn!("Cannot remove old backup {}: {}", name, e);
            }
        }
    }
}

fn stamp(name: &str) -> &str {
    name.rsplit('_').next().unwrap_or(name)
}

fn sqlite_failure(message: String) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(1), Some(message))
}

fn io_failure(action: &str, err: std::io::Error) -> rusqlite::Error {
    log::error!("Cannot {}: {}", action, err);
    sqlite_failure(format!("cannot {}: {}", action, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>>>()
            .unwrap()
    }

    #[test]
    fn test_versions_are_contiguous_from_zero() {
        for (i, m) in MIGRATIONS.iter().enumerate() {
            assert_eq!(m.version as usize, i, "{} is out of sequence", m.name);
        }
    }

    #[test]
    fn test_fresh_database_gets_full_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();

        let runner = MigrationRunner::new();
        assert_eq!(runner.run_pending_migrations(&conn, ":memory:").unwrap(), 4);
        assert_eq!(runner.get_current_version(&conn).unwrap(), Some(runner.latest_version()));

        let tables = tables(&conn);
        for table in ["accounts", "backtest_trades", "payouts", "profiles", "schema_migrations", "sessions", "trades", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();

        runner.run_pending_migrations(&conn, ":memory:").unwrap();
        assert_eq!(runner.run_pending_migrations(&conn, ":memory:").unwrap(), 0);
    }

    #[test]
    fn test_tampered_checksum_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::new();
        runner.run_pending_migrations(&conn, ":memory:").unwrap();

        let recorded: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations WHERE checksum IS NOT NULL", [], |row| row.get(0))
            .unwrap();
        assert_eq!(recorded, MIGRATIONS.len() as i64);
        runner.verify_migrations(&conn).unwrap();

        conn.execute("UPDATE schema_migrations SET checksum = 'edited' WHERE version = 2", [])
            .unwrap();
        assert!(runner.verify_migrations(&conn).is_err());
    }

    #[test]
    fn test_broken_migration_leaves_no_trace() {
        let conn = Connection::open_in_memory().unwrap();
        apply(&conn, &MIGRATIONS[0]).unwrap();
        apply(&conn, &MIGRATIONS[1]).unwrap();

        let broken = Migration {
            version: 2,
            name: "broken",
            sql: "CREATE TABLE half_done (id INTEGER); NOT SQL AT ALL",
        };
        assert!(apply(&conn, &broken).is_err());

        assert_eq!(MigrationRunner::new().get_current_version(&conn).unwrap(), Some(1));
        assert!(!tables(&conn).iter().any(|t| t == "half_done"));
    }

    #[test]
    fn test_upgrade_on_disk_keeps_a_copy() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("journal.db");
        let db_path = db_path.to_str().unwrap();

        {
            let conn = Connection::open(db_path).unwrap();
            apply(&conn, &MIGRATIONS[0]).unwrap();
            apply(&conn, &MIGRATIONS[1]).unwrap();
        }

        let conn = Connection::open(db_path).unwrap();
        assert_eq!(MigrationRunner::new().run_pending_migrations(&conn, db_path).unwrap(), 3);

        let copies: Vec<_> = fs::read_dir(dir.path().join("backups")).unwrap().collect();
        assert_eq!(copies.len(), 1);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let backups = Backups {
            dir: dir.path().to_path_buf(),
        };
        for i in 0..7 {
            fs::write(dir.path().join(format!("pre_migration_v3_20261018120000{:03}.db", i)), b"").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        backups.prune();

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left.len(), Backups::KEEP + 1);
        assert!(left.contains(&"notes.txt".to_string()));
        assert!(!left.contains(&"pre_migration_v3_20261018120000000.db".to_string()));
    }
}
