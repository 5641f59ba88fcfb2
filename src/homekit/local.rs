//! In-process accessory host with a JSON accessory cache.
//!
//! Keeps registered accessories in memory and writes them to a cache file on
//! every change, so the next start restores the same UUIDs and contexts.
//! Characteristic reads and writes are dispatched to the bound handlers.

use super::accessory::PlatformAccessory;
use super::host::{AccessoryHost, CharacteristicHandler};
use super::types::{CharacteristicValue, HomekitCharacteristic, HomekitService};
use crate::error::{BridgeError, Result};
use log::{debug, error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Persisted accessory cache
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AccessoryCache {
    pub accessories: Vec<PlatformAccessory>,
}

impl AccessoryCache {
    /// Load from file
    pub fn load(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<AccessoryCache>(&bytes) {
                Ok(cache) => {
                    info!(
                        "[Host] Loaded {} cached accessories from {:?}",
                        cache.accessories.len(),
                        path
                    );
                    cache
                }
                Err(e) => {
                    warn!("[Host] Failed to parse accessory cache: {}", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[Host] No accessory cache found (first run)");
                Self::default()
            }
            Err(e) => {
                error!("[Host] Failed to read accessory cache: {}", e);
                Self::default()
            }
        }
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        debug!(
            "[Host] Saved {} accessories to {:?}",
            self.accessories.len(),
            path
        );
        Ok(())
    }
}

pub struct LocalHost {
    cache_path: Option<PathBuf>,
    restored: Vec<PlatformAccessory>,
    accessories: RwLock<BTreeMap<Uuid, PlatformAccessory>>,
    handlers: RwLock<HashMap<Uuid, Arc<dyn CharacteristicHandler>>>,
}

impl LocalHost {
    /// Host without a cache file.
    pub fn in_memory() -> Self {
        Self {
            cache_path: None,
            restored: Vec::new(),
            accessories: RwLock::new(BTreeMap::new()),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Host backed by a cache file, restoring whatever it contains.
    pub fn with_cache(path: PathBuf) -> Self {
        let cache = AccessoryCache::load(&path);
        let accessories = cache
            .accessories
            .iter()
            .map(|accessory| (accessory.uuid, accessory.clone()))
            .collect();
        Self {
            cache_path: Some(path),
            restored: cache.accessories,
            accessories: RwLock::new(accessories),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Accessories restored from the cache at startup.
    pub fn cached_accessories(&self) -> Vec<PlatformAccessory> {
        self.restored.clone()
    }

    /// Accessories currently registered.
    pub fn accessories(&self) -> Vec<PlatformAccessory> {
        self.accessories.read().values().cloned().collect()
    }

    pub fn accessory(&self, uuid: Uuid) -> Option<PlatformAccessory> {
        self.accessories.read().get(&uuid).cloned()
    }

    pub fn read(
        &self,
        uuid: Uuid,
        service: HomekitService,
        characteristic: HomekitCharacteristic,
    ) -> Result<CharacteristicValue> {
        self.handler(uuid)?.read(service, characteristic)
    }

    pub fn write(
        &self,
        uuid: Uuid,
        service: HomekitService,
        characteristic: HomekitCharacteristic,
        value: CharacteristicValue,
    ) -> Result<()> {
        debug!(
            "[Host] {} {:?}.{:?} <- {:?}",
            uuid, service, characteristic, value
        );
        self.handler(uuid)?.write(service, characteristic, value)
    }

    fn handler(&self, uuid: Uuid) -> Result<Arc<dyn CharacteristicHandler>> {
        self.handlers
            .read()
            .get(&uuid)
            .cloned()
            .ok_or(BridgeError::AccessoryNotBound(uuid))
    }

    fn persist(&self) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let cache = AccessoryCache {
            accessories: self.accessories(),
        };
        if let Err(e) = cache.save(path) {
            error!("[Host] Failed to save accessory cache: {}", e);
        }
    }
}

impl AccessoryHost for LocalHost {
    fn register_accessories(&self, accessories: &[PlatformAccessory]) {
        {
            let mut registered = self.accessories.write();
            for accessory in accessories {
                info!("[Host] Registering accessory: {}", accessory.display_name);
                registered.insert(accessory.uuid, accessory.clone());
            }
        }
        self.persist();
    }

    fn update_accessories(&self, accessories: &[PlatformAccessory]) {
        {
            let mut registered = self.accessories.write();
            for accessory in accessories {
                registered.insert(accessory.uuid, accessory.clone());
            }
        }
        self.persist();
    }

    fn unregister_accessories(&self, accessories: &[PlatformAccessory]) {
        {
            let mut registered = self.accessories.write();
            let mut handlers = self.handlers.write();
            for accessory in accessories {
                info!("[Host] Unregistering accessory: {}", accessory.display_name);
                registered.remove(&accessory.uuid);
                handlers.remove(&accessory.uuid);
            }
        }
        self.persist();
    }

    fn bind_handler(&self, uuid: Uuid, handler: Arc<dyn CharacteristicHandler>) {
        debug!(
            "[Host] Bound {} characteristics for {}",
            handler.characteristics().len(),
            uuid
        );
        self.handlers.write().insert(uuid, handler);
    }
}
