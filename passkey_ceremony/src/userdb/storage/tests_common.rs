//! Behaviour every `CredentialStore` must share, run against each backend.

use std::sync::Arc;

use super::store_type::CredentialStore;
use crate::userdb::errors::UserError;
use crate::userdb::types::{Credential, UserIdentity};

fn identity(email: &str) -> UserIdentity {
    UserIdentity::new(email, "", "").normalized().unwrap()
}

fn credential(id: &str, user_id: &str, sign_count: u32) -> Credential {
    Credential::new(
        id.to_string(),
        user_id.to_string(),
        vec![1, 2, 3, id.len() as u8],
        sign_count,
        vec!["internal".to_string()],
        "test agent".to_string(),
    )
}

pub(crate) async fn run_contract(store: &dyn CredentialStore) {
    store.init().await.unwrap();

    // get_or_create is stable per email
    let alice = store
        .get_or_create_user(&identity("alice@example.com"))
        .await
        .unwrap();
    let again = store
        .get_or_create_user(&identity("alice@example.com"))
        .await
        .unwrap();
    assert_eq!(alice.id, again.id);

    // create_user refuses an existing email
    assert!(matches!(
        store.create_user(&identity("alice@example.com")).await,
        Err(UserError::Conflict(_))
    ));
    let bob = store
        .create_user(&identity("bob@example.com"))
        .await
        .unwrap();

    // lookups
    assert_eq!(store.get_user(&alice.id).await.unwrap().unwrap().email, "alice@example.com");
    assert_eq!(
        store.get_user_by_email("bob@example.com").await.unwrap().unwrap().id,
        bob.id
    );
    assert!(store.get_user("missing").await.unwrap().is_none());
    assert!(store.get_user_by_email("nobody@example.com").await.unwrap().is_none());

    // add_credential then get_user returns identical id and key blob
    let first = credential("cred-a1", &alice.id, 0);
    store.add_credential(&alice.id, &first).await.unwrap();
    let second = credential("cred-a2", &alice.id, 3);
    store.add_credential(&alice.id, &second).await.unwrap();

    let loaded = store.get_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(loaded.credential_ids(), vec!["cred-a1", "cred-a2"]);
    let loaded_first = loaded.credential("cred-a1").unwrap();
    assert_eq!(loaded_first.public_key, first.public_key);
    assert_eq!(loaded_first.transports, first.transports);
    assert!(!loaded_first.clone_warning);

    // credential ids are unique across users, and the user must exist
    assert!(matches!(
        store.add_credential(&bob.id, &credential("cred-a1", &bob.id, 0)).await,
        Err(UserError::Conflict(_))
    ));
    assert!(matches!(
        store.add_credential("missing", &credential("cred-x", "missing", 0)).await,
        Err(UserError::NotFound)
    ));
    assert_eq!(
        store.get_credential("cred-a2").await.unwrap().unwrap().user_id,
        alice.id
    );
    assert!(store.get_credential("cred-x").await.unwrap().is_none());

    // zero after zero is the no-counter case, not a regression
    let mut used = first.clone();
    used.sign_count = 0;
    used.public_key = vec![9, 9];
    let update = store.update_credential(&alice.id, &used).await.unwrap();
    assert!(!update.clone_warning_raised);
    assert_eq!(update.credential.public_key, vec![9, 9]);

    // an advancing counter is accepted
    let mut advanced = second.clone();
    advanced.sign_count = 4;
    let update = store.update_credential(&alice.id, &advanced).await.unwrap();
    assert!(!update.clone_warning_raised);
    assert_eq!(update.credential.sign_count, 4);
    assert!(update.credential.last_used_at.is_some());

    // a repeated counter raises the clone warning and keeps the stored counter
    let mut replayed = second.clone();
    replayed.sign_count = 4;
    replayed.public_key = vec![7];
    let update = store.update_credential(&alice.id, &replayed).await.unwrap();
    assert!(update.clone_warning_raised);
    assert!(update.credential.clone_warning);
    assert_eq!(update.credential.sign_count, 4);
    assert_ne!(update.credential.public_key, vec![7]);
    assert!(
        store
            .get_credential("cred-a2")
            .await
            .unwrap()
            .unwrap()
            .clone_warning
    );

    // updates must target the owner
    assert!(matches!(
        store.update_credential(&bob.id, &advanced).await,
        Err(UserError::NotFound)
    ));

    // save_user changes profile fields only
    let mut profile = store.get_user(&bob.id).await.unwrap().unwrap();
    profile.display_name = "Robert".to_string();
    profile.is_active = false;
    store.save_user(&profile).await.unwrap();
    let saved = store.get_user(&bob.id).await.unwrap().unwrap();
    assert_eq!(saved.display_name, "Robert");
    assert!(!saved.is_active);
    assert_eq!(saved.email, "bob@example.com");

    let mut ghost = profile.clone();
    ghost.id = "missing".to_string();
    assert!(matches!(store.save_user(&ghost).await, Err(UserError::NotFound)));

    // remove_credential is idempotent and scoped to the owner
    store.remove_credential(&bob.id, "cred-a1").await.unwrap();
    assert!(store.get_credential("cred-a1").await.unwrap().is_some());
    store.remove_credential(&alice.id, "cred-a1").await.unwrap();
    store.remove_credential(&alice.id, "cred-a1").await.unwrap();
    assert!(store.get_credential("cred-a1").await.unwrap().is_none());
    let remaining = store.get_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(remaining.credential_ids(), vec!["cred-a2"]);
}

pub(crate) async fn concurrent_get_or_create(store: Arc<dyn CredentialStore>) {
    store.init().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .get_or_create_user(&identity("race@example.com"))
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

/// Concurrent registrations for one user must all land.
pub(crate) async fn concurrent_add_credentials(store: Arc<dyn CredentialStore>) {
    store.init().await.unwrap();
    let user = store
        .get_or_create_user(&identity("many-keys@example.com"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let user_id = user.id.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("cred-race-{i}");
            store
                .add_credential(&user_id, &credential(&id, &user_id, 0))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut ids = store
        .get_user(&user.id)
        .await
        .unwrap()
        .unwrap()
        .credential_ids();
    ids.sort();
    let expected: Vec<String> = (0..8).map(|i| format!("cred-race-{i}")).collect();
    assert_eq!(ids, expected);
}
