//! Per-installation device identity.
//!
//! The identifier is issued once by the sync server and cached in durable
//! local storage under a fixed key. It is only regenerated when missing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::models::DeviceId;
use crate::sync::SyncTransport;
use crate::util::normalize_text_option;

/// Storage key the device identifier is persisted under
pub const DEVICE_ID_KEY: &str = "travelgrid_device_id";

/// Durable storage for the device identifier
pub trait DeviceIdStore: Send + Sync {
    fn load_device_id(&self) -> Result<Option<DeviceId>>;
    fn save_device_id(&self, device_id: &DeviceId) -> Result<()>;
}

/// JSON key-value file holding the device identifier
#[derive(Debug, Clone)]
pub struct FileDeviceIdStore {
    path: PathBuf,
}

impl FileDeviceIdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| {
            Error::Storage(format!(
                "failed to parse device store at {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl DeviceIdStore for FileDeviceIdStore {
    fn load_device_id(&self) -> Result<Option<DeviceId>> {
        let mut entries = self.read_entries()?;
        Ok(normalize_text_option(entries.remove(DEVICE_ID_KEY)).map(DeviceId::new))
    }

    fn save_device_id(&self, device_id: &DeviceId) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut entries = self.read_entries()?;
        entries.insert(DEVICE_ID_KEY.to_string(), device_id.to_string());
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// Process-local store, for tests and ephemeral sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceIdStore {
    inner: Arc<Mutex<Option<DeviceId>>>,
}

impl MemoryDeviceIdStore {
    /// Store pre-seeded with an identifier
    pub fn with_device_id(device_id: impl Into<DeviceId>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(device_id.into()))),
        }
    }
}

impl DeviceIdStore for MemoryDeviceIdStore {
    fn load_device_id(&self) -> Result<Option<DeviceId>> {
        let guard = self
            .inner
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))?;
        Ok(guard.clone())
    }

    fn save_device_id(&self, device_id: &DeviceId) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|error| Error::Storage(error.to_string()))?;
        *guard = Some(device_id.clone());
        Ok(())
    }
}

/// Resolves the device identifier, creating it on first use
#[derive(Debug, Clone)]
pub struct DeviceIdentity<S: DeviceIdStore> {
    store: S,
    cached: Option<DeviceId>,
}

impl<S: DeviceIdStore> DeviceIdentity<S> {
    pub const fn new(store: S) -> Self {
        Self {
            store,
            cached: None,
        }
    }

    /// Return the persisted identifier, requesting one from the server when
    /// none exists yet.
    ///
    /// Returns `Ok(None)` when the server cannot issue an identifier; callers
    /// treat sync as unavailable. Storage failures are errors.
    pub async fn get_or_create<T: SyncTransport>(
        &mut self,
        transport: &T,
    ) -> Result<Option<DeviceId>> {
        if let Some(device_id) = &self.cached {
            return Ok(Some(device_id.clone()));
        }

        if let Some(device_id) = self.store.load_device_id()? {
            self.cached = Some(device_id.clone());
            return Ok(Some(device_id));
        }

        let device_id = match transport.generate_device_id().await {
            Ok(device_id) if !device_id.as_str().trim().is_empty() => device_id,
            Ok(_) => {
                tracing::warn!("Sync server issued an empty device id");
                return Ok(None);
            }
            Err(error) => {
                tracing::warn!("Failed to generate device id: {}", error);
                return Ok(None);
            }
        };

        self.store.save_device_id(&device_id)?;
        tracing::info!("Registered new device id {}", device_id);
        self.cached = Some(device_id.clone());
        Ok(Some(device_id))
    }

    /// Identifier resolved so far in this session
    pub const fn current(&self) -> Option<&DeviceId> {
        self.cached.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::ScriptedTransport;

    fn store_in(dir: &tempfile::TempDir) -> (FileDeviceIdStore, PathBuf) {
        let path = dir.path().join("travelgrid").join("device.json");
        (FileDeviceIdStore::new(&path), path)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn generates_once_and_persists() {
        let transport = ScriptedTransport::new();
        transport.set_next_device_id("device-abc");
        let store = MemoryDeviceIdStore::default();
        let mut identity = DeviceIdentity::new(store.clone());

        let first = identity.get_or_create(&transport).await.unwrap();
        let second = identity.get_or_create(&transport).await.unwrap();

        assert_eq!(first, Some(DeviceId::new("device-abc")));
        assert_eq!(first, second);
        assert_eq!(transport.calls().generate_device_id, 1);
        assert_eq!(
            store.load_device_id().unwrap(),
            Some(DeviceId::new("device-abc"))
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reuses_persisted_id_without_server_call() {
        let transport = ScriptedTransport::new();
        let mut identity = DeviceIdentity::new(MemoryDeviceIdStore::with_device_id("stored"));

        let device_id = identity.get_or_create(&transport).await.unwrap();

        assert_eq!(device_id, Some(DeviceId::new("stored")));
        assert_eq!(transport.calls().generate_device_id, 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_server_yields_no_identifier() {
        let transport = ScriptedTransport::new();
        transport.fail_next_device_id();
        let store = MemoryDeviceIdStore::default();
        let mut identity = DeviceIdentity::new(store.clone());

        assert_eq!(identity.get_or_create(&transport).await.unwrap(), None);
        assert_eq!(store.load_device_id().unwrap(), None);
        assert!(identity.current().is_none());
    }

    #[test]
    fn file_store_round_trips_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_in(&dir);
        assert_eq!(store.load_device_id().unwrap(), None);

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();
        assert_eq!(store.load_device_id().unwrap(), None);

        store.save_device_id(&DeviceId::new("device-1")).unwrap();
        assert_eq!(
            store.load_device_id().unwrap(),
            Some(DeviceId::new("device-1"))
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"theme\""));
        assert!(raw.contains(DEVICE_ID_KEY));
    }

    #[test]
    fn file_store_treats_blank_id_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_in(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!(r#"{{"{DEVICE_ID_KEY}": "  "}}"#)).unwrap();

        assert_eq!(store.load_device_id().unwrap(), None);
    }

    #[test]
    fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_in(&dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let error = store.load_device_id().unwrap_err();
        assert!(matches!(error, Error::Storage(_)));
    }
}
