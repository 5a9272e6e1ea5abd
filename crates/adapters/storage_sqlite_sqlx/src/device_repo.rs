//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use scenehub_app::ports::DeviceRepository;
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::DeviceId;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let identity: String = row.try_get("identity")?;
        let name: String = row.try_get("name")?;
        let plugin_id: String = row.try_get("plugin_id")?;
        let location: Option<String> = row.try_get("location")?;

        let id = DeviceId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Device {
            id,
            identity,
            name,
            plugin_id,
            location,
        }))
    }
}

const UPSERT: &str = "INSERT INTO devices (id, identity, name, plugin_id, location) VALUES (?, ?, ?, ?, ?) \
     ON CONFLICT (identity) DO UPDATE SET name = excluded.name, plugin_id = excluded.plugin_id, location = excluded.location";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_BY_IDENTITY: &str = "SELECT * FROM devices WHERE identity = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY name";

/// `SQLite`-backed device repository.
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find_by_identity(
        &self,
        identity: &str,
    ) -> impl Future<Output = Result<Option<Device>, SceneHubError>> + Send {
        let pool = self.pool.clone();
        let identity = identity.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_IDENTITY)
                .bind(identity)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn upsert(&self, device: Device) -> impl Future<Output = Result<Device, SceneHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            device.validate()?;
            sqlx::query(UPSERT)
                .bind(device.id.to_string())
                .bind(&device.identity)
                .bind(&device.name)
                .bind(&device.plugin_id)
                .bind(&device.location)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            // The identity may already have been known under another id.
            let stored: Option<Wrapper> = sqlx::query_as(SELECT_BY_IDENTITY)
                .bind(&device.identity)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(stored).unwrap_or(device))
        }
    }
}
