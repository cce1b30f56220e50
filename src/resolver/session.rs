//! Scoped store handle

use esp_config_store::{OpenMode, OverrideStore, StoreError, StoreHandle};

/// An open store handle, closed when dropped
pub(crate) struct Session<'s, S: OverrideStore + ?Sized> {
    store: &'s S,
    handle: StoreHandle,
}

impl<'s, S: OverrideStore + ?Sized> Session<'s, S> {
    pub(crate) fn open(store: &'s S, namespace: &str, mode: OpenMode) -> Result<Self, StoreError> {
        let handle = store.open(namespace, mode)?;
        Ok(Self { store, handle })
    }

    pub(crate) fn handle(&self) -> StoreHandle {
        self.handle
    }
}

impl<S: OverrideStore + ?Sized> Drop for Session<'_, S> {
    fn drop(&mut self) {
        self.store.close(self.handle);
    }
}
