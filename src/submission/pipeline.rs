//! Submission pipeline: sends the merged payload and finishes the session.
//!
//! On success the session token is persisted and both snapshots are cleared.
//! On any failure before the account exists the snapshots stay exactly as they
//! were, so the caller can offer a retry that re-runs reconcile + submit
//! without re-collecting input. Once the account exists nothing is retried.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::client::AccountService;
use super::reconcile::{MergeReconciler, MergedSubmission};
use crate::error::{StorageError, SubmissionError};
use crate::store::snapshots::SnapshotStore;

/// Storage key of the persisted session token.
pub const SESSION_TOKEN_KEY: &str = "session.token";
/// Storage key of the user object returned at registration.
pub const SESSION_USER_KEY: &str = "session.user";

/// Session credential returned by the account service.
#[derive(Debug, Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Sends merged submissions to the account service, one at a time.
pub struct SubmissionPipeline {
    service: Arc<dyn AccountService>,
    snapshots: SnapshotStore,
    reconciler: MergeReconciler,
    in_flight: Mutex<()>,
}

impl SubmissionPipeline {
    pub fn new(service: Arc<dyn AccountService>, snapshots: SnapshotStore) -> Self {
        Self {
            service,
            reconciler: MergeReconciler::new(snapshots.clone()),
            snapshots,
            in_flight: Mutex::new(()),
        }
    }

    /// Use a differently configured reconciler for [`SubmissionPipeline::resubmit`].
    pub fn with_reconciler(mut self, reconciler: MergeReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn reconciler(&self) -> &MergeReconciler {
        &self.reconciler
    }

    /// Submit `payload` once. No automatic retry.
    pub async fn submit(&self, payload: &MergedSubmission) -> Result<SessionToken, SubmissionError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SubmissionError::InFlight)?;

        let created = match self.service.register(payload).await {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    email = %payload.email,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Submission failed; snapshots retained"
                );
                return Err(e);
            }
        };

        // The account exists remotely from here on. Local failures must not
        // turn into a retry that the server would reject as a duplicate.
        let token = SessionToken::new(created.token);
        let kv = self.snapshots.kv();
        if let Err(source) = kv.set(SESSION_TOKEN_KEY, token.expose()).await {
            error!(email = %payload.email, error = %source, "Account created but session token not stored");
            self.clear_snapshots().await;
            return Err(SubmissionError::SessionNotPersisted { token, source });
        }
        if !created.user.is_null() {
            if let Err(e) = kv.set(SESSION_USER_KEY, &created.user.to_string()).await {
                warn!(error = %e, "Failed to store registered user");
            }
        }
        self.clear_snapshots().await;

        info!(email = %payload.email, "Onboarding submission complete");
        Ok(token)
    }

    async fn clear_snapshots(&self) {
        if let Err(e) = self.snapshots.clear_all().await {
            warn!(error = %e, "Failed to clear onboarding snapshots after registration");
        }
    }

    /// Reconcile the stored snapshots and submit the result.
    pub async fn resubmit(&self) -> Result<SessionToken, SubmissionError> {
        let payload = self.reconciler.reconcile().await?;
        self.submit(&payload).await
    }

    /// The session token persisted by a previous successful submission.
    pub async fn stored_token(&self) -> Result<Option<SessionToken>, StorageError> {
        Ok(self
            .snapshots
            .kv()
            .get(SESSION_TOKEN_KEY)
            .await?
            .map(SessionToken::new))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::store::snapshots::{Record, SnapshotKey};
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::submission::client::AccountCreated;

    /// Account service that replays a scripted outcome.
    pub(crate) struct StubAccountService {
        pub outcome: fn() -> Result<AccountCreated, SubmissionError>,
        pub calls: AtomicUsize,
    }

    impl StubAccountService {
        pub(crate) fn new(outcome: fn() -> Result<AccountCreated, SubmissionError>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AccountService for StubAccountService {
        async fn register(
            &self,
            _payload: &MergedSubmission,
        ) -> Result<AccountCreated, SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    pub(crate) fn created() -> Result<AccountCreated, SubmissionError> {
        Ok(AccountCreated {
            token: "tok-123".to_string(),
            user: json!({"id": 7, "email": "a@b.com"}),
        })
    }

    fn offline() -> Result<AccountCreated, SubmissionError> {
        Err(SubmissionError::Transport {
            reason: "connection refused".to_string(),
            timeout: None,
        })
    }

    fn duplicate() -> Result<AccountCreated, SubmissionError> {
        Err(SubmissionError::Rejected {
            status: 400,
            message: "email: user with this email already exists.".to_string(),
        })
    }

    async fn seeded_store() -> (Arc<MemoryStore>, SnapshotStore) {
        let kv = Arc::new(MemoryStore::new());
        let snapshots = SnapshotStore::new(kv.clone());
        let creds = json!({"email": "a@b.com", "password": "x", "password2": "x"});
        snapshots
            .write_snapshot(SnapshotKey::Credentials, creds.as_object().unwrap())
            .await
            .unwrap();
        snapshots
            .write_snapshot(SnapshotKey::Profile, &Record::from_iter([("age".to_string(), json!(23))]))
            .await
            .unwrap();
        (kv, snapshots)
    }

    async fn raw_snapshots(kv: &MemoryStore) -> (Option<String>, Option<String>) {
        (
            kv.get(SnapshotKey::Credentials.as_str()).await.unwrap(),
            kv.get(SnapshotKey::Profile.as_str()).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn success_persists_token_and_clears_snapshots() {
        let (kv, snapshots) = seeded_store().await;
        let service = StubAccountService::new(created);
        let pipeline = SubmissionPipeline::new(service.clone(), snapshots.clone());

        let token = pipeline.resubmit().await.unwrap();
        assert_eq!(token.expose(), "tok-123");
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        assert_eq!(raw_snapshots(&kv).await, (None, None));
        assert!(snapshots.status().await.unwrap().is_empty());
        assert_eq!(pipeline.stored_token().await.unwrap().unwrap().expose(), "tok-123");
        let user = kv.get(SESSION_USER_KEY).await.unwrap().unwrap();
        assert!(user.contains("\"id\":7"));
    }

    #[tokio::test]
    async fn failures_leave_snapshots_untouched() {
        for outcome in [offline as fn() -> Result<AccountCreated, SubmissionError>, duplicate] {
            let (kv, snapshots) = seeded_store().await;
            let before = raw_snapshots(&kv).await;
            let pipeline = SubmissionPipeline::new(StubAccountService::new(outcome), snapshots);

            assert!(pipeline.resubmit().await.is_err());
            assert_eq!(raw_snapshots(&kv).await, before);
            assert!(pipeline.stored_token().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn transport_and_rejection_are_distinguishable() {
        let (_kv, snapshots) = seeded_store().await;
        let pipeline = SubmissionPipeline::new(StubAccountService::new(offline), snapshots.clone());
        let err = pipeline.resubmit().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.routes_to_credentials());

        let pipeline = SubmissionPipeline::new(StubAccountService::new(duplicate), snapshots);
        let err = pipeline.resubmit().await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.routes_to_credentials());
        assert!(matches!(err, SubmissionError::Rejected { status: 400, ref message } if message.contains("already exists")));
    }

    #[tokio::test]
    async fn retry_after_transport_failure_succeeds_without_recollecting() {
        let (kv, snapshots) = seeded_store().await;
        let failing = SubmissionPipeline::new(StubAccountService::new(offline), snapshots.clone());
        assert!(failing.resubmit().await.is_err());

        let recovered = SubmissionPipeline::new(StubAccountService::new(created), snapshots);
        assert!(recovered.resubmit().await.is_ok());
        assert_eq!(raw_snapshots(&kv).await, (None, None));
    }

    #[tokio::test]
    async fn invalid_merge_never_reaches_the_service() {
        let snapshots = SnapshotStore::new(Arc::new(MemoryStore::new()));
        let service = StubAccountService::new(created);
        let pipeline = SubmissionPipeline::new(service.clone(), snapshots);

        let err = pipeline.resubmit().await.unwrap_err();
        assert!(matches!(err, SubmissionError::Invalid(_)));
        assert!(err.routes_to_credentials());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_submit_is_refused() {
        let (_kv, snapshots) = seeded_store().await;
        let pipeline = SubmissionPipeline::new(StubAccountService::new(created), snapshots);
        let payload = pipeline.reconciler().reconcile().await.unwrap();

        let _held = pipeline.in_flight.try_lock().unwrap();
        assert!(matches!(
            pipeline.submit(&payload).await.unwrap_err(),
            SubmissionError::InFlight
        ));
    }

    /// Store whose writes fail for one key.
    struct FailingKey {
        inner: MemoryStore,
        key: &'static str,
    }

    #[async_trait]
    impl KeyValueStore for FailingKey {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Query("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }
        async fn remove(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.remove(key).await
        }
    }

    async fn seeded_failing(key: &'static str) -> (Arc<FailingKey>, SnapshotStore) {
        let kv = Arc::new(FailingKey {
            inner: MemoryStore::new(),
            key,
        });
        let snapshots = SnapshotStore::new(kv.clone());
        let creds = json!({"email": "a@b.com", "password": "x", "password2": "x"});
        snapshots
            .write_snapshot(SnapshotKey::Credentials, creds.as_object().unwrap())
            .await
            .unwrap();
        (kv, snapshots)
    }

    #[tokio::test]
    async fn user_write_failure_still_completes_registration() {
        let (kv, snapshots) = seeded_failing(SESSION_USER_KEY).await;
        let pipeline = SubmissionPipeline::new(StubAccountService::new(created), snapshots.clone());

        let token = pipeline.resubmit().await.unwrap();
        assert_eq!(token.expose(), "tok-123");
        assert_eq!(pipeline.stored_token().await.unwrap().unwrap().expose(), "tok-123");
        assert!(kv.get(SESSION_USER_KEY).await.unwrap().is_none());
        assert!(snapshots.status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_write_failure_is_final_and_carries_token() {
        let (_kv, snapshots) = seeded_failing(SESSION_TOKEN_KEY).await;
        let service = StubAccountService::new(created);
        let pipeline = SubmissionPipeline::new(service.clone(), snapshots.clone());

        let err = pipeline.resubmit().await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(!err.routes_to_credentials());
        match err {
            SubmissionError::SessionNotPersisted { ref token, .. } => {
                assert_eq!(token.expose(), "tok-123")
            }
            ref other => panic!("expected SessionNotPersisted, got {other}"),
        }
        assert!(snapshots.status().await.unwrap().is_empty());

        // Nothing left to resubmit, so a retry never re-posts the account.
        assert!(matches!(
            pipeline.resubmit().await.unwrap_err(),
            SubmissionError::Invalid(_)
        ));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
