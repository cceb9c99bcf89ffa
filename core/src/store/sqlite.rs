use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, SqliteConnection};
use tokio::sync::Mutex;
use tracing::debug;

use pifleet_common::error::StoreError;
use pifleet_common::models::device::{
    Device, DeviceRecord, name_candidates,
};
use pifleet_common::models::setup::Setup;
use pifleet_common::network::mac::MacAddress;
use pifleet_common::network::range::{Cidr, Subnet24};
use pifleet_common::store::Store;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS setups (
        iprange TEXT PRIMARY KEY,
        name    TEXT NOT NULL,
        slug    TEXT NOT NULL,
        created TEXT NOT NULL,
        updated TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS devices (
        mac             TEXT PRIMARY KEY,
        name            TEXT NOT NULL,
        ip              TEXT UNIQUE,
        iprange         TEXT NOT NULL,
        model           TEXT NOT NULL,
        telemetry       TEXT NOT NULL,
        lag             TEXT,
        master          INTEGER NOT NULL DEFAULT 0,
        sort            INTEGER NOT NULL DEFAULT 0,
        missing         INTEGER NOT NULL DEFAULT 0,
        missed_scans    INTEGER NOT NULL DEFAULT 0,
        last_connection TEXT
    )",
    "CREATE INDEX IF NOT EXISTS devices_iprange ON devices (iprange)",
    "CREATE UNIQUE INDEX IF NOT EXISTS devices_name ON devices (name)",
];

const DEVICE_COLUMNS: &str = "mac, name, ip, iprange, model, telemetry, lag, master, sort, \
                              missing, missed_scans, last_connection";

/// Devices and setups in a SQLite database.
///
/// Writes are serialised behind `write_gate` and each runs in its own transaction, so
/// concurrent scan workers never race on the read-modify-write of a device row.
pub struct SqliteStore {
    pool: SqlitePool,
    write_gate: Mutex<()>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(backend)?;

        debug!("Opened device database at {}", path.display());
        Self::with_pool(pool).await
    }

    /// A private database that lives as long as this store.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(backend)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await.map_err(backend)?;
        }
        Ok(Self {
            pool,
            write_gate: Mutex::new(()),
        })
    }

    async fn find_by_mac(
        conn: &mut SqliteConnection,
        mac: &MacAddress,
    ) -> Result<Option<Device>, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE mac = ?");
        sqlx::query(&sql)
            .bind(mac.to_string())
            .fetch_optional(conn)
            .await
            .map_err(backend)?
            .map(|row| device_from_row(&row))
            .transpose()
    }

    async fn free_name(
        conn: &mut SqliteConnection,
        record: &DeviceRecord,
    ) -> Result<String, StoreError> {
        for name in name_candidates(record.ip, &record.mac) {
            let taken: Option<String> = sqlx::query_scalar("SELECT mac FROM devices WHERE name = ?")
                .bind(&name)
                .fetch_optional(&mut *conn)
                .await
                .map_err(backend)?;
            if taken.is_none() {
                return Ok(name);
            }
        }
        Err(StoreError::Backend("no free device name".to_string()))
    }

    async fn write_device(conn: &mut SqliteConnection, device: &Device) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO devices ({DEVICE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(mac) DO UPDATE SET
                name = excluded.name,
                ip = excluded.ip,
                iprange = excluded.iprange,
                model = excluded.model,
                telemetry = excluded.telemetry,
                lag = excluded.lag,
                master = excluded.master,
                sort = excluded.sort,
                missing = excluded.missing,
                missed_scans = excluded.missed_scans,
                last_connection = excluded.last_connection"
        );
        let lag = device.lag.as_ref().map(to_json).transpose()?;

        sqlx::query(&sql)
            .bind(device.mac.to_string())
            .bind(&device.name)
            .bind(device.ip.map(|ip| ip.to_string()))
            .bind(&device.iprange)
            .bind(to_json(&device.model)?)
            .bind(to_json(&device.telemetry)?)
            .bind(lag)
            .bind(device.master)
            .bind(device.sort)
            .bind(device.missing)
            .bind(i64::from(device.missed_scans))
            .bind(device.last_connection.map(|at| at.to_rfc3339()))
            .execute(conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn fetch_devices(
        &self,
        filter: &str,
        arg: Option<String>,
    ) -> Result<Vec<Device>, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices {filter} ORDER BY sort, name");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(arg);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.iter().map(device_from_row).collect()
    }
}

fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(backend)
}

fn from_json<T: DeserializeOwned>(column: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Backend(format!("column {column}: {e}")))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(backend)
}

/// `a.b.c.%` for LIKE matching every address of the /24.
fn subnet_pattern(subnet: Subnet24) -> String {
    let [a, b, c] = subnet.octets();
    format!("{a}.{b}.{c}.%")
}

fn device_from_row(row: &SqliteRow) -> Result<Device, StoreError> {
    let mac: String = row.try_get("mac").map_err(backend)?;
    let ip: Option<String> = row.try_get("ip").map_err(backend)?;
    let model: String = row.try_get("model").map_err(backend)?;
    let telemetry: String = row.try_get("telemetry").map_err(backend)?;
    let lag: Option<String> = row.try_get("lag").map_err(backend)?;
    let missed_scans: i64 = row.try_get("missed_scans").map_err(backend)?;
    let last_connection: Option<String> = row.try_get("last_connection").map_err(backend)?;

    Ok(Device {
        mac: mac.parse().map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        ip: ip
            .map(|raw| raw.parse::<Ipv4Addr>())
            .transpose()
            .map_err(backend)?,
        iprange: row.try_get("iprange").map_err(backend)?,
        model: from_json("model", &model)?,
        telemetry: from_json("telemetry", &telemetry)?,
        lag: lag.map(|raw| from_json("lag", &raw)).transpose()?,
        master: row.try_get("master").map_err(backend)?,
        sort: row.try_get("sort").map_err(backend)?,
        missing: row.try_get("missing").map_err(backend)?,
        missed_scans: u32::try_from(missed_scans).unwrap_or(u32::MAX),
        last_connection: last_connection.as_deref().map(parse_time).transpose()?,
    })
}

fn setup_from_row(row: &SqliteRow) -> Result<Setup, StoreError> {
    let created: String = row.try_get("created").map_err(backend)?;
    let updated: String = row.try_get("updated").map_err(backend)?;
    Ok(Setup {
        iprange: row.try_get("iprange").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        slug: row.try_get("slug").map_err(backend)?,
        created: parse_time(&created)?,
        updated: parse_time(&updated)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn setup(&self, key: &str) -> Result<Option<Setup>, StoreError> {
        let key = key.trim();
        sqlx::query(
            "SELECT iprange, name, slug, created, updated FROM setups
             WHERE iprange = ?1 OR slug = ?1 OR name = ?1
             ORDER BY iprange LIMIT 1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .map(|row| setup_from_row(&row))
        .transpose()
    }

    async fn setups(&self) -> Result<Vec<Setup>, StoreError> {
        let rows = sqlx::query(
            "SELECT iprange, name, slug, created, updated FROM setups ORDER BY iprange",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(setup_from_row).collect()
    }

    async fn upsert_setup(&self, name: &str, cidr: &Cidr) -> Result<Setup, StoreError> {
        let _gate = self.write_gate.lock().await;
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let existing = sqlx::query(
            "SELECT iprange, name, slug, created, updated FROM setups WHERE iprange = ?",
        )
        .bind(cidr.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .map(|row| setup_from_row(&row))
        .transpose()?;

        let setup = match existing {
            Some(mut setup) => {
                setup.rename(name, now);
                setup
            }
            None => Setup::new(name, cidr, now),
        };

        sqlx::query(
            "INSERT INTO setups (iprange, name, slug, created, updated) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(iprange) DO UPDATE SET
                name = excluded.name, slug = excluded.slug, updated = excluded.updated",
        )
        .bind(&setup.iprange)
        .bind(&setup.name)
        .bind(&setup.slug)
        .bind(setup.created.to_rfc3339())
        .bind(setup.updated.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(setup)
    }

    async fn ensure_setup(&self, cidr: &Cidr) -> Result<Setup, StoreError> {
        let _gate = self.write_gate.lock().await;
        let fresh = Setup::new("", cidr, Utc::now());
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO setups (iprange, name, slug, created, updated) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(iprange) DO NOTHING",
        )
        .bind(&fresh.iprange)
        .bind(&fresh.name)
        .bind(&fresh.slug)
        .bind(fresh.created.to_rfc3339())
        .bind(fresh.updated.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        let row = sqlx::query(
            "SELECT iprange, name, slug, created, updated FROM setups WHERE iprange = ?",
        )
        .bind(&fresh.iprange)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        setup_from_row(&row)
    }

    async fn devices_in_range(&self, cidr: &Cidr) -> Result<Vec<Device>, StoreError> {
        self.fetch_devices("WHERE iprange = ?", Some(cidr.to_string()))
            .await
    }

    async fn all_devices(&self) -> Result<Vec<Device>, StoreError> {
        self.fetch_devices("", None).await
    }

    async fn device_by_ip(&self, ip: Ipv4Addr) -> Result<Option<Device>, StoreError> {
        let mut devices = self.fetch_devices("WHERE ip = ?", Some(ip.to_string())).await?;
        Ok(devices.pop())
    }

    async fn upsert_device_by_mac(&self, record: DeviceRecord) -> Result<Device, StoreError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query("UPDATE devices SET ip = NULL WHERE ip = ? AND mac <> ?")
            .bind(record.ip.to_string())
            .bind(record.mac.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let other_master: Option<String> = sqlx::query_scalar(
            "SELECT mac FROM devices WHERE master = 1 AND mac <> ? AND ip LIKE ? LIMIT 1",
        )
        .bind(record.mac.to_string())
        .bind(subnet_pattern(Subnet24::of(record.ip)))
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let device = match Self::find_by_mac(&mut tx, &record.mac).await? {
            Some(mut existing) => {
                existing.apply(record);
                if other_master.is_some() {
                    existing.master = false;
                }
                existing
            }
            None => {
                let name = Self::free_name(&mut tx, &record).await?;
                Device::from_record(record, name)
            }
        };

        Self::write_device(&mut tx, &device).await?;
        tx.commit().await.map_err(backend)?;
        Ok(device)
    }

    async fn mark_missing(
        &self,
        macs: &[MacAddress],
        threshold: u32,
    ) -> Result<Vec<MacAddress>, StoreError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut flagged = Vec::new();

        for mac in macs {
            let Some(mut device) = Self::find_by_mac(&mut tx, mac).await? else {
                continue;
            };
            device.record_absence(threshold);
            sqlx::query("UPDATE devices SET missing = ?, missed_scans = ? WHERE mac = ?")
                .bind(device.missing)
                .bind(i64::from(device.missed_scans))
                .bind(mac.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            if device.missing {
                flagged.push(*mac);
            }
        }

        tx.commit().await.map_err(backend)?;
        Ok(flagged)
    }

    async fn master_candidate_by_prefix(
        &self,
        subnet: Subnet24,
    ) -> Result<Option<Device>, StoreError> {
        let candidates = self
            .fetch_devices("WHERE master = 1 AND ip LIKE ?", Some(subnet_pattern(subnet)))
            .await?;
        Ok(candidates
            .into_iter()
            .find(|d| d.ip.is_some_and(|ip| subnet.contains(ip))))
    }

    async fn set_master(&self, ip: Ipv4Addr) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let known: Option<String> = sqlx::query_scalar("SELECT mac FROM devices WHERE ip = ?")
            .bind(ip.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?;
        if known.is_none() {
            return Err(StoreError::NotFound(ip.to_string()));
        }

        sqlx::query("UPDATE devices SET master = 0 WHERE ip LIKE ?")
            .bind(subnet_pattern(Subnet24::of(ip)))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        sqlx::query("UPDATE devices SET master = 1 WHERE ip = ?")
            .bind(ip.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
