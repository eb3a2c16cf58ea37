//! # Strongbox Keystore
//!
//! Core of an envelope-encrypted secret store: DEK lifecycle and caching,
//! KEK-backed wrapping through a KMS adapter, opportunistic per-secret
//! rotation, and the auth state machine gating every operation.
//!
//! Built on `strongbox-envelope` for the at-rest package format.
//!
//! ## Quick Start
//!
//! ```ignore
//! use strongbox_keystore::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store: Arc<dyn DurableStore> = Arc::new(InMemoryStore::new());
//! let kms: Arc<dyn KmsAdapter> = Arc::new(DevKms::new([0u8; 32], "local"));
//! let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
//!
//! let engine = Arc::new(DekEngine::load(store.clone(), kms, audit.clone()).await.unwrap());
//! engine.create_dek("primary").await.unwrap();
//!
//! let secrets = SecretService::new(store, engine, None, audit);
//! let record = secrets.create("db-password", b"hunter2!", None).unwrap();
//! let content = secrets.get(&record.id).unwrap();
//! assert_eq!(&*content.plaintext, b"hunter2!");
//! # });
//! ```

pub mod audit;
pub mod auth;
pub mod engine;
pub mod error;
pub mod folders;
pub mod guard;
pub mod kms;
pub mod rotation;
pub mod secrets;
pub mod storage;
pub mod token;
pub mod types;

pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use auth::{hash_secret, verify_secret, AuthContext, AuthService, LoginOutcome};
pub use engine::DekEngine;
pub use error::{ErrorKind, Result};
pub use folders::FolderService;
pub use guard::{authorize, AccessCheck, WILDCARD};
pub use kms::{
    DevKms, HttpKmsClient, KmsAdapter, KmsClient, KmsDecryptResponse, KmsEncryptResponse,
    RemoteKms,
};
pub use rotation::RotationPool;
pub use secrets::{SecretContent, SecretService};
pub use storage::{DurableStore, FileStore, InMemoryStore};
pub use token::{Claims, TokenSigner};
pub use types::{
    ClientRecord, DekId, DekRecord, FolderRecord, RotationFailure, RotationReport, SecretRecord,
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    fn kms() -> Arc<DevKms> {
        Arc::new(DevKms::new([7u8; 32], "kek1"))
    }

    fn audit() -> Arc<InMemoryAuditSink> {
        Arc::new(InMemoryAuditSink::new())
    }

    async fn engine_over(store: Arc<InMemoryStore>) -> Arc<DekEngine> {
        Arc::new(DekEngine::load(store, kms(), audit()).await.unwrap())
    }

    fn secrets_over(store: Arc<InMemoryStore>, engine: Arc<DekEngine>) -> SecretService {
        SecretService::new(store, engine, None, audit())
    }

    // === Engine startup ===

    #[tokio::test]
    async fn startup_with_empty_table_defaults_to_one() {
        let engine = engine_over(store()).await;
        assert_eq!(engine.default_dek_id(), 1);
        // No DEK rows yet, so nothing to encrypt with until bootstrap runs.
        assert!(engine.default_key().is_err());
    }

    #[tokio::test]
    async fn startup_defaults_to_highest_id() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        engine.create_dek("k2").await.unwrap();
        engine.create_dek("k3").await.unwrap();

        let reloaded = engine_over(s).await;
        assert_eq!(reloaded.default_dek_id(), 3);
        for id in 1..=3 {
            assert!(reloaded.key_for(id).is_ok());
        }
    }

    #[tokio::test]
    async fn startup_survives_restart_for_sealed_secrets() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s.clone(), engine);
        let record = secrets.create("s1", b"persisted!", None).unwrap();

        let reloaded = engine_over(s.clone()).await;
        let secrets = secrets_over(s, reloaded);
        let content = secrets.get(&record.id).unwrap();
        assert_eq!(&*content.plaintext, b"persisted!");
    }

    #[tokio::test]
    async fn startup_fails_if_any_dek_cannot_unwrap() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("good").await.unwrap();
        s.create_dek("bad", &[0xDE, 0xAD, 0xBE, 0xEF], "kek1").unwrap();

        let result = DekEngine::load(s, kms(), audit()).await;
        assert!(result.is_err());
    }

    // === DEK creation ===

    #[tokio::test]
    async fn create_dek_assigns_monotonic_ids_and_moves_default() {
        let engine = engine_over(store()).await;
        let d1 = engine.create_dek("k1").await.unwrap();
        assert_eq!(d1.id, 1);
        assert_eq!(engine.default_dek_id(), 1);

        let d2 = engine.create_dek("k2").await.unwrap();
        assert_eq!(d2.id, 2);
        assert_eq!(engine.default_dek_id(), 2);
        assert_eq!(d2.version, 1);
        assert!(d2.active);
    }

    #[tokio::test]
    async fn create_dek_duplicate_name_conflicts() {
        let engine = engine_over(store()).await;
        engine.create_dek("k1").await.unwrap();
        let err = engine.create_dek("k1").await.unwrap_err();
        assert!(matches!(err, ErrorKind::Conflict(_)));
    }

    #[tokio::test]
    async fn create_dek_persists_only_wrapped_material() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        let row = engine.create_dek("k1").await.unwrap();

        // The stored bytes are an AEAD wrap (nonce + key + tag), and
        // unwrapping them yields exactly the cached key.
        assert_eq!(row.wrapped_key.len(), 12 + 32 + 16);
        let unwrapped = kms().unwrap_dek(&row.wrapped_key, &row.kek_id).await.unwrap();
        let cached = engine.key_for(row.id).unwrap();
        assert_eq!(*unwrapped, *cached);
    }

    // === KEK rotation ===

    #[tokio::test]
    async fn rotate_kek_rewraps_every_dek() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        for name in ["k1", "k2", "k3"] {
            engine.create_dek(name).await.unwrap();
        }
        let secrets = secrets_over(s.clone(), engine.clone());
        let record = secrets.create("s1", b"survives rotation", None).unwrap();

        let report = engine.rotate_kek("kek2", None).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.success, 3);
        assert!(report.failures.is_empty());

        for row in s.list_deks().unwrap() {
            assert_eq!(row.kek_id, "kek2");
            assert_eq!(row.version, 2);
        }

        // In-memory DEK bytes are unchanged, so old ciphertexts still open.
        assert_eq!(&*secrets.get(&record.id).unwrap().plaintext, b"survives rotation");

        // And a cold restart unwraps everything under the new KEK.
        let reloaded = engine_over(s.clone()).await;
        let secrets = secrets_over(s, reloaded);
        assert_eq!(&*secrets.get(&record.id).unwrap().plaintext, b"survives rotation");
    }

    #[tokio::test]
    async fn rotate_kek_twice_is_idempotent() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        engine.create_dek("k2").await.unwrap();

        engine.rotate_kek("kek2", None).await.unwrap();
        let report = engine.rotate_kek("kek2", None).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.success, 2);
        assert!(report.failures.is_empty());

        // No-op rows keep their version.
        for row in s.list_deks().unwrap() {
            assert_eq!(row.version, 2);
        }
    }

    #[tokio::test]
    async fn rotate_kek_honors_old_kek_filter() {
        let engine = engine_over(store()).await;
        engine.create_dek("k1").await.unwrap();
        engine.create_dek("k2").await.unwrap();

        let none = engine.rotate_kek("kek2", Some("other-kek")).await.unwrap();
        assert_eq!(none.total, 0);

        let all = engine.rotate_kek("kek2", Some("kek1")).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.success, 2);
    }

    #[tokio::test]
    async fn rotate_kek_updates_wrap_target_for_new_deks() {
        let engine = engine_over(store()).await;
        engine.create_dek("k1").await.unwrap();
        engine.rotate_kek("kek2", None).await.unwrap();
        assert_eq!(engine.current_kek_id(), "kek2");

        let row = engine.create_dek("k2").await.unwrap();
        assert_eq!(row.kek_id, "kek2");
    }

    #[tokio::test]
    async fn rotate_kek_collects_per_dek_failures() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("good").await.unwrap();
        let mut bad = engine.create_dek("bad").await.unwrap();
        bad.wrapped_key = vec![0u8; 60];
        s.update_dek(&bad).unwrap();

        let report = engine.rotate_kek("kek2", None).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.success, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, bad.id);

        // The healthy row was still rewrapped.
        assert_eq!(s.get_dek(1).unwrap().unwrap().kek_id, "kek2");
    }

    // === DEK deletion ===

    #[tokio::test]
    async fn delete_dek_refused_while_referenced() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s.clone(), engine.clone());
        let record = secrets.create("s1", b"references dek 1", None).unwrap();

        engine.create_dek("k2").await.unwrap();
        let err = engine.delete_dek(1).unwrap_err();
        assert!(matches!(err, ErrorKind::Conflict(_)));

        secrets.delete(&record.id).unwrap();
        engine.delete_dek(1).unwrap();
        assert!(s.get_dek(1).unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_current_default_dek_refused() {
        let engine = engine_over(store()).await;
        engine.create_dek("k1").await.unwrap();
        let err = engine.delete_dek(1).unwrap_err();
        assert!(matches!(err, ErrorKind::Conflict(_)));
    }

    #[tokio::test]
    async fn deactivated_dek_still_decrypts() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s, engine.clone());
        let record = secrets.create("s1", b"old but readable", None).unwrap();

        let row = engine.deactivate_dek(1).unwrap();
        assert!(!row.active);
        assert_eq!(&*secrets.get(&record.id).unwrap().plaintext, b"old but readable");
    }

    // === Secrets ===

    #[tokio::test]
    async fn secret_create_get_roundtrip() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s, engine);

        let record = secrets.create("db-password", b"hunter2!", None).unwrap();
        assert_eq!(record.dek_id, 1);

        let by_id = secrets.get(&record.id).unwrap();
        assert_eq!(&*by_id.plaintext, b"hunter2!");

        let by_name = secrets.get_by_name("db-password").unwrap();
        assert_eq!(by_name.record.id, record.id);

        // Envelope header and row column agree.
        let header = strongbox_envelope::peek_header(&by_id.record.package).unwrap();
        assert_eq!(header.dek_id, by_id.record.dek_id);
    }

    #[tokio::test]
    async fn secret_duplicate_name_conflicts() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s, engine);

        secrets.create("s1", b"first value", None).unwrap();
        let err = secrets.create("s1", b"second value", None).unwrap_err();
        assert!(matches!(err, ErrorKind::Conflict(_)));
    }

    #[tokio::test]
    async fn secret_get_missing_is_not_found() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s, engine);
        assert!(matches!(
            secrets.get_by_name("nope").unwrap_err(),
            ErrorKind::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn secret_update_reseals_under_current_default() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s, engine.clone());
        let record = secrets.create("s1", b"original", None).unwrap();
        assert_eq!(record.dek_id, 1);

        engine.create_dek("k2").await.unwrap();
        let updated = secrets.update(&record.id, Some(b"replaced"), None, None).unwrap();
        assert_eq!(updated.dek_id, 2);
        assert_eq!(&*secrets.get(&record.id).unwrap().plaintext, b"replaced");
    }

    #[tokio::test]
    async fn secret_tamper_is_a_crypto_failure() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s.clone(), engine);
        let record = secrets.create("s1", b"integrity!", None).unwrap();

        let mut row = s.get_secret(&record.id).unwrap().unwrap();
        let last = row.package.len() - 1;
        row.package[last] ^= 0x01;
        s.update_secret(&row).unwrap();

        let err = secrets.get(&record.id).unwrap_err();
        assert_eq!(err, ErrorKind::CryptoFailure { dek_id: 1 });
    }

    #[tokio::test]
    async fn secret_row_and_header_dek_disagreement_fails() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        engine.create_dek("k2").await.unwrap();
        let secrets = secrets_over(s.clone(), engine);

        // Sealed under DEK 2 (the default), then the row column is bent
        // to point at DEK 1.
        let record = secrets.create("s1", b"mismatch", None).unwrap();
        let mut row = s.get_secret(&record.id).unwrap().unwrap();
        row.dek_id = 1;
        s.update_secret(&row).unwrap();

        let err = secrets.get(&record.id).unwrap_err();
        assert_eq!(err, ErrorKind::CryptoFailure { dek_id: 1 });
    }

    // === Opportunistic rotation ===

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn read_of_stale_secret_triggers_background_rotation() {
        let s = store();
        let audit_sink = audit();
        let engine = Arc::new(DekEngine::load(s.clone(), kms(), audit_sink.clone()).await.unwrap());
        engine.create_dek("k1").await.unwrap();

        let pool = RotationPool::spawn(s.clone(), engine.clone(), audit_sink.clone(), 2, 64);
        let secrets = SecretService::new(s.clone(), engine.clone(), Some(pool), audit_sink.clone());

        let record = secrets.create("s1", b"stale but readable", None).unwrap();
        engine.create_dek("k2").await.unwrap();

        // The read itself returns immediately with the old envelope.
        let content = secrets.get(&record.id).unwrap();
        assert_eq!(&*content.plaintext, b"stale but readable");
        assert_eq!(content.record.dek_id, 1);

        // Within a bounded delay the row is re-sealed under the default.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let row = s.get_secret(&record.id).unwrap().unwrap();
            if row.dek_id == 2 {
                let header = strongbox_envelope::peek_header(&row.package).unwrap();
                assert_eq!(header.dek_id, 2);
                assert!(row.last_rotation.is_some());
                break;
            }
            assert!(std::time::Instant::now() < deadline, "rotation never drained");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Plaintext is unchanged after rotation.
        assert_eq!(&*secrets.get(&record.id).unwrap().plaintext, b"stale but readable");
        assert!(audit_sink
            .events()
            .iter()
            .any(|e| matches!(e.action, AuditAction::SecretRotated { from_dek: 1, to_dek: 2, .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn read_of_current_secret_schedules_nothing() {
        let s = store();
        let audit_sink = audit();
        let engine = Arc::new(DekEngine::load(s.clone(), kms(), audit_sink.clone()).await.unwrap());
        engine.create_dek("k1").await.unwrap();

        let pool = RotationPool::spawn(s.clone(), engine.clone(), audit_sink.clone(), 1, 8);
        let secrets = SecretService::new(s.clone(), engine, Some(pool.clone()), audit_sink);

        let record = secrets.create("s1", b"already current", None).unwrap();
        secrets.get(&record.id).unwrap();
        assert!(pool.is_idle());
    }

    // === Auth ===

    fn auth_service(store: Arc<InMemoryStore>, sink: Arc<InMemoryAuditSink>) -> AuthService {
        let signer = TokenSigner::new(b"0123456789abcdef0123456789abcdef", Duration::from_secs(3600));
        AuthService::new(store, signer, sink)
    }

    #[test]
    fn register_hashes_with_argon2id() {
        let auth = auth_service(store(), audit());
        let client = auth
            .register("alice", "correct horse", BTreeSet::new(), BTreeSet::new())
            .unwrap();
        assert!(client.hashed_secret.starts_with("$argon2id$"));
        assert!(!client.hashed_secret.contains("correct horse"));
    }

    #[test]
    fn login_roundtrip_and_last_used() {
        let s = store();
        let auth = auth_service(s.clone(), audit());
        auth.register("alice", "correct horse", BTreeSet::new(), BTreeSet::new())
            .unwrap();

        let outcome = auth.login("alice", "correct horse").unwrap();
        assert!(!outcome.token.is_empty());
        assert!(outcome.client.last_used_at.is_some());

        let stored = s.find_client_by_name("alice").unwrap().unwrap();
        assert!(stored.last_used_at.is_some());
    }

    #[test]
    fn login_failures_are_uniform() {
        let auth = auth_service(store(), audit());
        let client = auth
            .register("alice", "correct horse", BTreeSet::new(), BTreeSet::new())
            .unwrap();

        assert_eq!(auth.login("alice", "wrong").unwrap_err(), ErrorKind::InvalidCredentials);
        assert_eq!(auth.login("nobody", "whatever").unwrap_err(), ErrorKind::InvalidCredentials);

        auth.revoke(&client.id).unwrap();
        assert_eq!(
            auth.login("alice", "correct horse").unwrap_err(),
            ErrorKind::InvalidCredentials
        );
    }

    #[test]
    fn register_duplicate_name_conflicts() {
        let auth = auth_service(store(), audit());
        auth.register("alice", "pw-one-here", BTreeSet::new(), BTreeSet::new())
            .unwrap();
        let err = auth
            .register("alice", "pw-two-here", BTreeSet::new(), BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, ErrorKind::Conflict(_)));
    }

    #[test]
    fn bootstrap_admin_seeds_only_empty_table() {
        let auth = auth_service(store(), audit());
        let admin = auth.bootstrap_admin("0000").unwrap().unwrap();
        assert_eq!(admin.name, "admin");
        assert!(admin.roles.contains("*"));
        assert!(admin.permissions.contains("*"));

        assert!(auth.bootstrap_admin("0000").unwrap().is_none());
    }

    #[test]
    fn bearer_resolution_state_machine() {
        let auth = auth_service(store(), audit());
        auth.register("alice", "correct horse", BTreeSet::new(), BTreeSet::new())
            .unwrap();
        let outcome = auth.login("alice", "correct horse").unwrap();

        let header = format!("Bearer {}", outcome.token);
        let ctx = auth.authenticate_bearer(Some(&header)).unwrap();
        assert_eq!(ctx.client.id, outcome.client.id);

        assert_eq!(
            auth.authenticate_bearer(None).unwrap_err(),
            ErrorKind::AuthenticationRequired
        );
        assert_eq!(
            auth.authenticate_bearer(Some("Basic abc")).unwrap_err(),
            ErrorKind::AuthenticationRequired
        );
        assert_eq!(
            auth.authenticate_bearer(Some("Bearer not.a.token")).unwrap_err(),
            ErrorKind::InvalidToken
        );

        auth.revoke(&outcome.client.id).unwrap();
        assert_eq!(
            auth.authenticate_bearer(Some(&header)).unwrap_err(),
            ErrorKind::InactiveClient
        );
    }

    // === Folders ===

    #[tokio::test]
    async fn folder_names_unique_per_parent() {
        let s = store();
        let folders = FolderService::new(s);
        let root_a = folders.create("a", None).unwrap();
        folders.create("b", None).unwrap();

        // Same name under a different parent is fine.
        folders.create("b", Some(root_a.id)).unwrap();

        let err = folders.create("a", None).unwrap_err();
        assert!(matches!(err, ErrorKind::Conflict(_)));
    }

    #[tokio::test]
    async fn folder_delete_cascades_recursively() {
        let s = store();
        let engine = engine_over(s.clone()).await;
        engine.create_dek("k1").await.unwrap();
        let secrets = secrets_over(s.clone(), engine);
        let folders = FolderService::new(s.clone());

        let root = folders.create("root", None).unwrap();
        let child = folders.create("child", Some(root.id)).unwrap();
        secrets.create("in-root", b"root secret", Some(root.id)).unwrap();
        secrets.create("in-child", b"child secret", Some(child.id)).unwrap();
        let outside = secrets.create("outside", b"kept secret", None).unwrap();

        folders.delete(&root.id).unwrap();
        assert!(s.get_folder(&root.id).unwrap().is_none());
        assert!(s.get_folder(&child.id).unwrap().is_none());
        assert!(s.find_secret_by_name("in-root").unwrap().is_none());
        assert!(s.find_secret_by_name("in-child").unwrap().is_none());
        assert!(s.get_secret(&outside.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn folder_reparent_into_descendant_refused() {
        let folders = FolderService::new(store());
        let root = folders.create("root", None).unwrap();
        let child = folders.create("child", Some(root.id)).unwrap();

        let err = folders.update(&root.id, None, Some(Some(child.id))).unwrap_err();
        assert!(matches!(err, ErrorKind::Validation(_)));

        let err = folders.update(&root.id, None, Some(Some(root.id))).unwrap_err();
        assert!(matches!(err, ErrorKind::Validation(_)));
    }

    // === File store ===

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(FileStore::new(dir.path()).unwrap());

        let d1 = s.create_dek("k1", &[1, 2, 3], "kek1").unwrap();
        let d2 = s.create_dek("k2", &[4, 5, 6], "kek1").unwrap();
        assert_eq!((d1.id, d2.id), (1, 2));

        let client = ClientRecord::new("alice", "$argon2id$stub".into(), BTreeSet::new(), BTreeSet::new());
        s.insert_client(&client).unwrap();

        let reopened = FileStore::new(dir.path()).unwrap();
        assert_eq!(reopened.list_deks().unwrap().len(), 2);
        assert_eq!(
            reopened.find_client_by_name("alice").unwrap().unwrap().id,
            client.id
        );

        // Monotonic ids continue after reopen.
        let d3 = reopened.create_dek("k3", &[7, 8, 9], "kek1").unwrap();
        assert_eq!(d3.id, 3);
    }

    #[tokio::test]
    async fn file_store_backed_engine_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let s: Arc<dyn DurableStore> = Arc::new(FileStore::new(dir.path()).unwrap());
        let engine = Arc::new(DekEngine::load(s.clone(), kms(), audit()).await.unwrap());
        engine.create_dek("k1").await.unwrap();

        let secrets = SecretService::new(s.clone(), engine, None, audit());
        let record = secrets.create("s1", b"on disk, sealed", None).unwrap();

        let engine2 = Arc::new(DekEngine::load(s.clone(), kms(), audit()).await.unwrap());
        let secrets2 = SecretService::new(s, engine2, None, audit());
        assert_eq!(&*secrets2.get(&record.id).unwrap().plaintext, b"on disk, sealed");
    }

    // === KMS adapter ===

    #[tokio::test]
    async fn dev_kms_wrap_unwrap_roundtrip() {
        let k = kms();
        let dek = strongbox_envelope::aead::generate_key().unwrap();
        let wrapped = k.wrap_dek(&dek, "kek1").await.unwrap();
        let unwrapped = k.unwrap_dek(&wrapped, "kek1").await.unwrap();
        assert_eq!(*dek, *unwrapped);
    }

    #[tokio::test]
    async fn dev_kms_wrong_kek_fails() {
        let k = kms();
        let dek = strongbox_envelope::aead::generate_key().unwrap();
        let wrapped = k.wrap_dek(&dek, "kek1").await.unwrap();
        assert!(k.unwrap_dek(&wrapped, "kek2").await.is_err());
    }

    #[tokio::test]
    async fn dev_kms_reencrypt_moves_keks() {
        let k = kms();
        let dek = strongbox_envelope::aead::generate_key().unwrap();
        let wrapped = k.wrap_dek(&dek, "kek1").await.unwrap();

        let rewrapped = k.reencrypt_dek(&wrapped, "kek1", "kek2").await.unwrap();
        let unwrapped = k.unwrap_dek(&rewrapped, "kek2").await.unwrap();
        assert_eq!(*dek, *unwrapped);
        assert!(k.unwrap_dek(&rewrapped, "kek1").await.is_err());
    }
}
