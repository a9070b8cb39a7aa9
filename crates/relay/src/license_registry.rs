use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use common::models::{LicenseKey, LicenseValidation, ValidationReason};
use common::{RelayError, RelayResult};
use storage::RecordStore;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::keygen;

type KeySource = Box<dyn Fn(&str) -> String + Send + Sync>;

pub struct LicenseRegistry {
    licenses: RwLock<HashMap<String, LicenseKey>>,
    store: Arc<dyn RecordStore>,
    key_source: KeySource,
}

impl LicenseRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            licenses: RwLock::new(HashMap::new()),
            store,
            key_source: Box::new(keygen::generate_key),
        }
    }

    /// Replaces the candidate generator. Candidates still go through the collision check.
    pub fn with_key_source(mut self, source: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.key_source = Box::new(source);
        self
    }

    pub async fn restore(&self, records: Vec<LicenseKey>) {
        let mut licenses = self.licenses.write().await;
        for license in records {
            licenses.insert(license.key.clone(), license);
        }
    }

    pub async fn issue(
        &self,
        mentor_id: &str,
        ea_id: &str,
        user_id: Option<String>,
    ) -> RelayResult<LicenseKey> {
        let ea_id = ea_id.trim();
        if ea_id.is_empty() {
            return Err(RelayError::validation(["ea_id"]));
        }
        let prefix = keygen::prefix_for(mentor_id);

        // Generate, check and insert under one write guard so two issuances
        // can never settle on the same key.
        let mut licenses = self.licenses.write().await;
        let key = loop {
            let candidate = (self.key_source)(&prefix);
            if !licenses.contains_key(&candidate) {
                break candidate;
            }
            debug!("License key collision on {}, regenerating", candidate);
        };

        let license = LicenseKey {
            key: key.clone(),
            mentor_id: mentor_id.to_string(),
            ea_id: ea_id.to_string(),
            user_id: user_id.filter(|u| !u.trim().is_empty()),
            active: true,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_license(&license).await {
            error!("Failed to persist license {}: {}", key, e);
            return Err(RelayError::Backend("license store unavailable".into()));
        }
        licenses.insert(key, license.clone());

        info!(
            "Issued license {} for mentor {} (EA {})",
            license.key, license.mentor_id, license.ea_id
        );
        Ok(license)
    }

    pub async fn validate(&self, key: &str) -> LicenseValidation {
        let key = key.trim();
        if !keygen::is_well_formed(key) {
            return LicenseValidation::rejected(ValidationReason::InvalidFormat);
        }

        let licenses = self.licenses.read().await;
        match licenses.get(key) {
            None => LicenseValidation::rejected(ValidationReason::NotFound),
            Some(license) if !license.active => {
                LicenseValidation::rejected(ValidationReason::Inactive)
            }
            Some(license) => LicenseValidation::valid(license.clone()),
        }
    }

    /// One-way and idempotent. Only the issuing mentor may deactivate.
    pub async fn deactivate(&self, mentor_id: &str, key: &str) -> RelayResult<LicenseKey> {
        let key = key.trim();
        let mut licenses = self.licenses.write().await;
        let license = licenses
            .get_mut(key)
            .ok_or_else(|| RelayError::NotFound("license".into()))?;

        if license.mentor_id != mentor_id {
            return Err(RelayError::Forbidden(
                "license belongs to another mentor".into(),
            ));
        }

        if license.active {
            if let Err(e) = self.store.set_license_active(key, false).await {
                error!("Failed to persist deactivation of {}: {}", key, e);
                return Err(RelayError::Backend("license store unavailable".into()));
            }
            license.active = false;
            info!("License {} deactivated by mentor {}", key, mentor_id);
        }

        Ok(license.clone())
    }

    /// Licenses issued by `mentor_id`, newest first.
    pub async fn list(&self, mentor_id: &str) -> Vec<LicenseKey> {
        let licenses = self.licenses.read().await;
        let mut owned: Vec<LicenseKey> = licenses
            .values()
            .filter(|l| l.mentor_id == mentor_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.key.cmp(&a.key)));
        owned
    }

    /// Keys of every license that has not been deactivated.
    pub async fn active_keys(&self) -> HashSet<String> {
        self.licenses
            .read()
            .await
            .values()
            .filter(|l| l.active)
            .map(|l| l.key.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.licenses.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use storage::{MockRecordStore, NullStore, StoreError};

    fn registry() -> LicenseRegistry {
        LicenseRegistry::new(Arc::new(NullStore))
    }

    fn store_down() -> StoreError {
        StoreError::Corrupt {
            table: "licenses",
            detail: "disk full".into(),
        }
    }

    #[tokio::test]
    async fn issued_keys_are_well_formed_and_unique() {
        let registry = registry();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let license = registry.issue("100200", "EA1", None).await.unwrap();
            assert!(keygen::is_well_formed(&license.key));
            assert!(license.key.starts_with("100200-"));
            assert!(license.active);
            assert!(seen.insert(license.key));
        }
        assert_eq!(registry.len().await, 500);
    }

    #[tokio::test]
    async fn concurrent_issuance_never_collides() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .issue("100200", &format!("EA{}", i % 4), None)
                        .await
                        .unwrap()
                        .key
                })
            })
            .collect();

        let mut keys = HashSet::new();
        for handle in handles {
            keys.insert(handle.await.unwrap());
        }
        assert_eq!(keys.len(), 64);
        assert_eq!(registry.len().await, 64);
    }

    #[tokio::test]
    async fn regenerates_on_collision() {
        let candidates = Mutex::new(vec![
            "100200-BBBB-0002".to_string(),
            "100200-AAAA-0001".to_string(),
            "100200-AAAA-0001".to_string(),
        ]);
        let registry = registry().with_key_source(move |_| {
            candidates
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "100200-ZZZZ-9999".into())
        });

        let first = registry.issue("100200", "EA1", None).await.unwrap();
        let second = registry.issue("100200", "EA1", None).await.unwrap();
        assert_eq!(first.key, "100200-AAAA-0001");
        assert_eq!(second.key, "100200-BBBB-0002");
    }

    #[tokio::test]
    async fn validation_reasons() {
        let registry = registry();
        let license = registry.issue("100200", "EA1", Some("u-7".into())).await.unwrap();

        let ok = registry.validate(&license.key).await;
        assert!(ok.valid);
        assert_eq!(ok.reason, ValidationReason::Valid);
        assert_eq!(ok.license.as_ref().map(|l| l.user_id.clone()), Some(Some("u-7".into())));

        let malformed = registry.validate("not a key").await;
        assert!(!malformed.valid);
        assert_eq!(malformed.reason, ValidationReason::InvalidFormat);

        let unknown = registry.validate("100200-0000-0000").await;
        assert!(!unknown.valid);
        assert_eq!(unknown.reason, ValidationReason::NotFound);

        registry.deactivate("100200", &license.key).await.unwrap();
        let inactive = registry.validate(&license.key).await;
        assert!(!inactive.valid);
        assert_eq!(inactive.reason, ValidationReason::Inactive);
        assert!(inactive.license.is_none());
    }

    #[tokio::test]
    async fn deactivation_is_idempotent_and_written_once() {
        let mut store = MockRecordStore::new();
        store.expect_insert_license().times(1).returning(|_| Ok(()));
        store
            .expect_set_license_active()
            .times(1)
            .returning(|_, _| Ok(()));
        let registry = LicenseRegistry::new(Arc::new(store));

        let license = registry.issue("100200", "EA1", None).await.unwrap();
        let first = registry.deactivate("100200", &license.key).await.unwrap();
        let second = registry.deactivate("100200", &license.key).await.unwrap();
        assert!(!first.active);
        assert!(!second.active);
        assert!(registry.active_keys().await.is_empty());
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let registry = registry();
        let l1 = registry.issue("M1", "EA1", None).await.unwrap();
        registry.issue("M2", "EA1", None).await.unwrap();

        assert_eq!(
            registry.deactivate("M2", &l1.key).await,
            Err(RelayError::Forbidden("license belongs to another mentor".into()))
        );
        assert!(registry.validate(&l1.key).await.valid);

        registry.deactivate("M1", &l1.key).await.unwrap();
        let after = registry.validate(&l1.key).await;
        assert!(!after.valid);
        assert_eq!(after.reason, ValidationReason::Inactive);

        let m1 = registry.list("M1").await;
        assert_eq!(m1.len(), 1);
        assert_eq!(m1[0].key, l1.key);
        assert!(registry.list("M3").await.is_empty());
    }

    #[tokio::test]
    async fn deactivating_unknown_key_is_not_found() {
        let registry = registry();
        assert_eq!(
            registry.deactivate("M1", "M1-AAAA-BBBB").await,
            Err(RelayError::NotFound("license".into()))
        );
    }

    #[tokio::test]
    async fn store_failure_leaves_no_license() {
        let mut store = MockRecordStore::new();
        store
            .expect_insert_license()
            .returning(|_| Err(store_down()));
        let registry = LicenseRegistry::new(Arc::new(store));

        let err = registry.issue("100200", "EA1", None).await.unwrap_err();
        assert_eq!(err.reason(), "backend_failure");
        assert_eq!(registry.len().await, 0);
        assert!(registry.list("100200").await.is_empty());
    }

    #[tokio::test]
    async fn blank_ea_is_rejected() {
        let registry = registry();
        assert_eq!(
            registry.issue("100200", "  ", None).await,
            Err(RelayError::validation(["ea_id"]))
        );
    }
}
