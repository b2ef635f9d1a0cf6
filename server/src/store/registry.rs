use crate::store::memory::{MemoryStore, StoreLimits};
use std::sync::{Arc, OnceLock};

static STORE: OnceLock<Arc<MemoryStore>> = OnceLock::new();

/// Installs the process-wide store. Later calls keep the first instance and
/// ignore their limits.
pub fn install(limits: StoreLimits) -> Arc<MemoryStore> {
    let mut created = false;
    let store = STORE.get_or_init(|| {
        created = true;
        Arc::new(MemoryStore::new(limits))
    });
    if created {
        log::info!("location store installed (recent limit {})", limits.recent);
    } else {
        log::debug!("location store already installed, reusing it");
    }
    Arc::clone(store)
}

pub fn installed() -> Option<Arc<MemoryStore>> {
    STORE.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_is_idempotent() {
        let first = install(StoreLimits::default());
        let second = install(StoreLimits {
            recent: 1,
            ..Default::default()
        });
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.limits().recent, 500);
        assert!(installed().is_some());
    }
}
