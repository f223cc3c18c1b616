use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::order::order::Order;
use crate::domain::order::order_state::OrderState;
use crate::domain::storage::{OrderStorage, StorageResult};
use crate::domain::utils::id::OrderId;
use crate::domain::utils::lock;
use crate::error::StorageError;

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredOrders {
    version: u32,
    orders: Vec<Order>,
}

/// Keeps every order in one JSON document.
///
/// Each write rewrites the whole document: the new content goes to a
/// temporary file that is renamed over the store, and the previous store is
/// kept as `<file>.backup`.
#[derive(Debug)]
pub struct JsonFileOrderStorage {
    path: PathBuf,
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl JsonFileOrderStorage {
    /// Opens the store at `path`, loading it if the file exists.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut orders = HashMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let stored: StoredOrders = serde_json::from_str(&content)?;
            if stored.version > STORE_VERSION {
                return Err(StorageError::Unavailable(format!(
                    "Order store version {} is newer than supported version {}",
                    stored.version, STORE_VERSION
                )));
            }
            for order in stored.orders {
                orders.insert(order.id().clone(), order);
            }
            log::debug!("Loaded {} stored orders from '{}'.", orders.len(), path.display());
        } else {
            log::debug!("Order store '{}' not found, starting empty.", path.display());
        }

        Ok(JsonFileOrderStorage { path, orders: Mutex::new(orders) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn flush(&self, orders: &HashMap<OrderId, Order>) -> StorageResult<()> {
        let parent = self.path.parent().filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            fs::create_dir_all(parent)?;
        }

        let mut sorted: Vec<Order> = orders.values().cloned().collect();
        sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id().cmp(b.id())));
        let content = serde_json::to_string_pretty(&StoredOrders { version: STORE_VERSION, orders: sorted })?;

        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        if self.path.exists() {
            fs::copy(&self.path, self.backup_path())?;
        }
        fs::rename(&temp, &self.path)?;
        sync_dir(parent.unwrap_or_else(|| Path::new(".")))?;
        Ok(())
    }

    /// Applies `change` to a copy of the cached orders and only commits the
    /// copy once it is on disk.
    fn write_with(&self, change: impl FnOnce(&mut HashMap<OrderId, Order>) -> StorageResult<()>) -> StorageResult<()> {
        let mut cached = lock::lock(&self.orders);
        let mut next = cached.clone();
        change(&mut next)?;
        self.flush(&next)?;
        *cached = next;
        Ok(())
    }
}

/// Makes a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> StorageResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

impl OrderStorage for JsonFileOrderStorage {
    fn save(&self, order: &Order) -> StorageResult<()> {
        self.write_with(|orders| {
            orders.insert(order.id().clone(), order.clone());
            Ok(())
        })
    }

    fn update(&self, order: &Order) -> StorageResult<()> {
        self.write_with(|orders| match orders.get_mut(order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(order.id().clone())),
        })
    }

    fn load_active(&self) -> StorageResult<Vec<Order>> {
        let orders = lock::lock(&self.orders);
        let mut active: Vec<Order> =
            orders.values().filter(|order| order.state() != OrderState::Deactivated).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id().cmp(b.id())));
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::identity::RequesterIdentity;
    use crate::domain::order::resource::ResourceSpec;
    use crate::domain::utils::id::{CloudName, InstanceId, MemberId};

    fn order(id: &str) -> Order {
        Order::new(
            OrderId::new(id),
            ResourceSpec::Compute {
                vcpu: 2,
                memory_mb: 2048,
                disk_gb: 20,
                image_id: "ubuntu-22.04".to_string(),
                network_order_ids: vec![OrderId::new("net-1")],
            },
            MemberId::new("site-a"),
            MemberId::new("site-b"),
            CloudName::new("default"),
            RequesterIdentity::new("alice", "ldap", "token"),
        )
        .with_requirement("zone", "east")
    }

    #[test]
    fn reopened_store_sees_previous_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");

        {
            let storage = JsonFileOrderStorage::open(&path).unwrap();
            let mut first = order("o-1");
            storage.save(&first).unwrap();
            first.set_instance_id(InstanceId::new("vm-1")).unwrap();
            storage.update(&first.snapshot_in(OrderState::Spawning)).unwrap();
        }

        let reopened = JsonFileOrderStorage::open(&path).unwrap();
        let active = reopened.load_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].state(), OrderState::Spawning);
        assert_eq!(active[0].instance_id(), Some(&InstanceId::new("vm-1")));
        assert_eq!(active[0].requirements.get("zone").map(String::as_str), Some("east"));
    }

    #[test]
    fn second_write_leaves_a_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("orders.json");
        let storage = JsonFileOrderStorage::open(&path).unwrap();

        storage.save(&order("o-1")).unwrap();
        assert!(!storage.backup_path().exists());
        storage.save(&order("o-2")).unwrap();
        assert!(storage.backup_path().exists());
        assert!(!storage.temp_path().exists());
    }

    #[test]
    fn failed_update_does_not_touch_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileOrderStorage::open(dir.path().join("orders.json")).unwrap();

        let err = storage.update(&order("never-saved")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(storage.load_active().unwrap().is_empty());
    }

    #[test]
    fn unwritable_temp_file_fails_the_save_and_keeps_the_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let storage = JsonFileOrderStorage::open(&path).unwrap();
        storage.save(&order("o-1")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        fs::create_dir(storage.temp_path()).unwrap();
        let err = storage.save(&order("o-2")).unwrap_err();

        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(storage.load_active().unwrap().len(), 1);
    }
}
