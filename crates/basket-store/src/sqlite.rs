//! SQLite-backed cart-session store.

use std::path::Path;

use basket_token::TokenCodec;
use basket_types::{CartPayload, Catalog};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, MutexGuard};
use rand::{Rng, distr::Alphanumeric};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::payload::{decode_payload, encode_payload};
use crate::store::{CartSession, CartSessionStore, CleanupReport, IssuedSession};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Prefix of every generated cart key.
pub const CART_KEY_PREFIX: &str = "ck_";

/// Random characters after the prefix.
const CART_KEY_RANDOM_LEN: usize = 40;

type KeyGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Generate a fresh random cart key (`ck_` + 40 alphanumerics).
pub fn generate_cart_key() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CART_KEY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", CART_KEY_PREFIX, suffix)
}

/// Thin repository over SQLite for cart sessions.
///
/// Thread-safe via an internal `Mutex<Connection>`; every public call holds
/// the lock for a single statement or a single-row write.
pub struct SqliteCartStore {
    conn: Mutex<Connection>,
    codec: TokenCodec,
    config: StoreConfig,
    key_generator: KeyGenerator,
}

impl SqliteCartStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path, codec: TokenCodec, config: StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn, codec, config)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory(codec: TokenCodec, config: StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, codec, config)
    }

    fn from_connection(conn: Connection, codec: TokenCodec, config: StoreConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout)?;

        let mut store = Self {
            conn: Mutex::new(conn),
            codec,
            config,
            key_generator: Box::new(generate_cart_key),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Replace the cart key generator.
    pub fn with_key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.key_generator = Box::new(generator);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn run_migrations(&mut self) -> Result<()> {
        let conn = self.conn.get_mut();
        embedded::migrations::runner()
            .run(conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Insert an empty row under `cart_key`. Returns `Ok(false)` on a key
    /// uniqueness conflict.
    fn try_insert(
        &self,
        cart_key: &str,
        payload: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now_str = now.to_rfc3339();
        let inserted = self.conn().execute(
            "INSERT INTO cart_sessions (cart_key, payload, expiry, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![cart_key, payload, expiry.timestamp(), now_str, now_str],
        );

        match inserted {
            Ok(_) => Ok(true),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Snapshot of every row's key and raw payload.
    fn scan_payloads(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT cart_key, payload FROM cart_sessions")?;
        let iter = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut rows = Vec::new();
        for r in iter {
            rows.push(r?);
        }
        Ok(rows)
    }

    /// Count rows regardless of expiry.
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM cart_sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Count rows whose expiry is strictly before `now`.
    pub fn expired_row_count(&self, now: DateTime<Utc>) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM cart_sessions WHERE expiry < ?1",
            params![now.timestamp()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Overwrite a row's raw payload text (maintenance and tests).
    pub fn write_raw_payload(&self, cart_key: &str, raw: &str) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE cart_sessions SET payload = ?1 WHERE cart_key = ?2",
            params![raw, cart_key],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(cart_key.to_string()));
        }
        Ok(())
    }
}

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or(StoreError::ExpiryOutOfRange(ttl.num_seconds()))
}

impl CartSessionStore for SqliteCartStore {
    fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    fn ping(&self) -> Result<()> {
        self.conn().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn create_with_ttl(&self, ttl: Duration) -> Result<IssuedSession> {
        let now = Utc::now();
        let expiry = expiry_after(now, ttl)?;
        let payload = CartPayload::new();
        let raw = encode_payload(&payload)?;

        let mut cart_key = (self.key_generator)();
        if !self.try_insert(&cart_key, &raw, expiry, now)? {
            warn!(cart_key = %cart_key, "Cart key collision, retrying with a new key");
            cart_key = (self.key_generator)();
            if !self.try_insert(&cart_key, &raw, expiry, now)? {
                return Err(StoreError::KeyCollision);
            }
        }

        let token = self.codec.issue(&cart_key, ttl)?;
        debug!(cart_key = %cart_key, expiry = %expiry, "Cart session created");

        Ok(IssuedSession {
            session: CartSession {
                cart_key,
                payload,
                expiry: truncate_to_seconds(expiry),
                created_at: now,
                updated_at: now,
            },
            token,
        })
    }

    fn load(&self, cart_key: &str) -> Result<CartSession> {
        let now = Utc::now();
        let row = self
            .conn()
            .query_row(
                "SELECT cart_key, payload, expiry, created_at, updated_at
                 FROM cart_sessions WHERE cart_key = ?1 AND expiry > ?2",
                params![cart_key, now.timestamp()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((key, raw, expiry, created_at, updated_at)) = row else {
            debug!(cart_key = %cart_key, "No live cart session");
            return Err(StoreError::NotFound(cart_key.to_string()));
        };

        let payload = decode_payload(&raw).map_err(|source| StoreError::CorruptPayload {
            cart_key: key.clone(),
            source,
        })?;

        Ok(CartSession {
            cart_key: key,
            payload,
            expiry: parse_ts(expiry),
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }

    fn save(
        &self,
        cart_key: &str,
        payload: &CartPayload,
        extend_ttl: bool,
    ) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        let ttl = if extend_ttl {
            self.default_ttl()
        } else {
            self.config.grace_ttl
        };
        let expiry = expiry_after(now, ttl)?;
        let raw = encode_payload(payload)?;

        let updated = self.conn().execute(
            "UPDATE cart_sessions SET payload = ?1, expiry = ?2, updated_at = ?3
             WHERE cart_key = ?4 AND expiry > ?5",
            params![
                raw,
                expiry.timestamp(),
                now.to_rfc3339(),
                cart_key,
                now.timestamp()
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(cart_key.to_string()));
        }

        debug!(cart_key = %cart_key, lines = payload.len(), extend_ttl, "Cart session saved");
        Ok(truncate_to_seconds(expiry))
    }

    fn delete(&self, cart_key: &str) -> Result<()> {
        let deleted = self.conn().execute(
            "DELETE FROM cart_sessions WHERE cart_key = ?1",
            params![cart_key],
        )?;
        debug!(cart_key = %cart_key, deleted, "Cart session deleted");
        Ok(())
    }

    fn cleanup(&self, catalog: Option<&dyn Catalog>) -> Result<CleanupReport> {
        let now = Utc::now();
        let mut report = CleanupReport::default();

        report.expired_count = self.conn().execute(
            "DELETE FROM cart_sessions WHERE expiry < ?1",
            params![now.timestamp()],
        )?;

        // Each remaining row is handled on its own. Writes compare against the
        // payload text we read so a concurrent save always wins.
        for (cart_key, raw) in self.scan_payloads()? {
            let mut payload = match decode_payload(&raw) {
                Ok(p) => p,
                Err(e) => {
                    warn!(cart_key = %cart_key, error = %e, "Dropping cart with corrupt payload");
                    report.corrupt_count += self.conn().execute(
                        "DELETE FROM cart_sessions WHERE cart_key = ?1 AND payload = ?2",
                        params![cart_key, raw],
                    )?;
                    continue;
                }
            };

            let Some(catalog) = catalog else {
                continue;
            };
            let dropped = payload.retain(|line| catalog.resolve_product(line.product_id).is_some());
            if dropped == 0 {
                continue;
            }

            let pruned = encode_payload(&payload)?;
            let updated = self.conn().execute(
                "UPDATE cart_sessions SET payload = ?1, updated_at = ?2
                 WHERE cart_key = ?3 AND payload = ?4",
                params![pruned, Utc::now().to_rfc3339(), cart_key, raw],
            )?;
            if updated > 0 {
                debug!(cart_key = %cart_key, dropped, "Pruned lines for missing products");
                report.pruned_item_count += dropped;
            }
        }

        info!(
            expired = report.expired_count,
            corrupt = report.corrupt_count,
            pruned_items = report.pruned_item_count,
            "Cart cleanup completed"
        );

        Ok(report)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    parse_ts(dt.timestamp())
}
