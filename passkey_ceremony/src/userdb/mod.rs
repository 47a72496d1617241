mod errors;
mod storage;
mod types;

pub use errors::UserError;
pub use storage::{CredentialStore, InMemoryCredentialStore, SqlCredentialStore};
pub use types::{
    Credential, CredentialUpdate, User, UserIdentity, counter_regressed, normalize_email,
};

use std::sync::Arc;

use crate::storage::DataStore;

/// Credential store for a connected data store, or the in-memory one when
/// there is none. The store is initialized before it is returned.
pub async fn credential_store_for(
    data_store: Option<Arc<dyn DataStore>>,
) -> Result<Arc<dyn CredentialStore>, UserError> {
    let store: Arc<dyn CredentialStore> = match data_store {
        Some(data_store) => Arc::new(SqlCredentialStore::new(data_store)),
        None => Arc::new(InMemoryCredentialStore::new()),
    };
    store.init().await?;
    Ok(store)
}
