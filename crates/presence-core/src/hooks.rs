use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

pub const HOOK_PREFIX: &str = "/hook/netatmo_presence_";

pub fn hook_path(instance_id: &str) -> String {
    format!("{HOOK_PREFIX}{instance_id}")
}

pub trait HookRegistry: Send + Sync {
    fn register(&self, path: &str);
    fn unregister(&self, path: &str);
    fn is_registered(&self, path: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct HookTable {
    paths: Arc<RwLock<BTreeSet<String>>>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths
            .read()
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl HookRegistry for HookTable {
    fn register(&self, path: &str) {
        if let Ok(mut paths) = self.paths.write() {
            paths.insert(path.to_string());
        }
    }

    fn unregister(&self, path: &str) {
        if let Ok(mut paths) = self.paths.write() {
            paths.remove(path);
        }
    }

    fn is_registered(&self, path: &str) -> bool {
        self.paths
            .read()
            .map(|paths| paths.contains(path))
            .unwrap_or(false)
    }
}
