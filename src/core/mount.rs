use std::fmt;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Unique id of the node an adapter mounts its player into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountId(String);

impl MountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The host container players are mounted into.
pub trait Surface: Send + Sync {
    fn attach(&self, id: &MountId);
    /// Returns `false` when the node was not attached.
    fn detach(&self, id: &MountId) -> bool;
    fn contains(&self, id: &MountId) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct MemorySurface {
    children: Arc<Mutex<Vec<MountId>>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.children.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Surface for MemorySurface {
    fn attach(&self, id: &MountId) {
        if let Ok(mut children) = self.children.lock() {
            children.push(id.clone());
        }
    }

    fn detach(&self, id: &MountId) -> bool {
        let Ok(mut children) = self.children.lock() else {
            return false;
        };
        match children.iter().position(|c| c == id) {
            Some(index) => {
                children.remove(index);
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: &MountId) -> bool {
        self.children
            .lock()
            .map(|c| c.contains(id))
            .unwrap_or(false)
    }
}
