//! Merge reconciler: combines the two snapshots into one submission.
//!
//! The reconciler is the only place cross-snapshot invariants are checked.
//! It never writes, so running it again after a failed submission yields the
//! same payload.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::store::snapshots::{Record, SnapshotKey, SnapshotStore};

/// Profile fields the account service understands.
pub const PROFILE_FIELDS: &[&str] = &[
    "gender",
    "age",
    "height",
    "weight",
    "duration",
    "goals",
    "body_focus",
    "motivation",
    "experience",
    "flexibility",
    "plank",
    "breathing",
    "restrictions",
];

/// The payload sent to the account service.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedSubmission {
    pub email: String,
    pub password: String,
    pub password2: String,
    pub name: String,
    /// Every other collected field, passed through untouched.
    #[serde(flatten)]
    pub profile: Record,
}

impl std::fmt::Debug for MergedSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedSubmission")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

/// Reads both snapshots and produces a validated [`MergedSubmission`].
#[derive(Clone)]
pub struct MergeReconciler {
    snapshots: SnapshotStore,
    require_profile: bool,
}

impl MergeReconciler {
    pub fn new(snapshots: SnapshotStore) -> Self {
        Self {
            snapshots,
            require_profile: false,
        }
    }

    /// Treat missing profile fields as an error instead of sending without them.
    pub fn with_require_profile(mut self, require_profile: bool) -> Self {
        self.require_profile = require_profile;
        self
    }

    /// Merge the stored snapshots. Absent snapshots count as empty records.
    pub async fn reconcile(&self) -> Result<MergedSubmission, ReconcileError> {
        let credentials = self
            .snapshots
            .read_snapshot(SnapshotKey::Credentials)
            .await?
            .unwrap_or_default();
        let profile = self
            .snapshots
            .read_snapshot(SnapshotKey::Profile)
            .await?
            .unwrap_or_default();

        let submission = build_submission(merge_records(&credentials, &profile), self.require_profile)?;
        debug!(
            email = %submission.email,
            profile_fields = submission.profile.len(),
            "Snapshots reconciled"
        );
        Ok(submission)
    }
}

/// Union of the two records; the credentials record wins on shared keys.
pub fn merge_records(credentials: &Record, profile: &Record) -> Record {
    let mut merged = profile.clone();
    for (key, value) in credentials {
        if let Some(previous) = merged.insert(key.clone(), value.clone()) {
            if &previous != value {
                warn!(key = %key, "Profile snapshot value overridden by credentials snapshot");
            }
        }
    }
    merged
}

/// Validate a merged record and shape it into the submission payload.
pub fn build_submission(
    mut merged: Record,
    require_profile: bool,
) -> Result<MergedSubmission, ReconcileError> {
    let email = take_string(&mut merged, "email");
    let password = take_string(&mut merged, "password");
    let password2 = take_string(&mut merged, "password2");

    let missing: Vec<&'static str> = [
        ("email", &email),
        ("password", &password),
        ("password2", &password2),
    ]
    .into_iter()
    .filter(|(_, value)| value.is_none())
    .map(|(key, _)| key)
    .collect();
    let (Some(email), Some(password), Some(password2)) = (email, password, password2) else {
        return Err(ReconcileError::MissingCredentials { missing });
    };
    if password != password2 {
        return Err(ReconcileError::PasswordMismatch);
    }

    if require_profile {
        let missing: Vec<&'static str> = PROFILE_FIELDS
            .iter()
            .copied()
            .filter(|key| merged.get(*key).is_none_or(is_blank))
            .collect();
        if !missing.is_empty() {
            return Err(ReconcileError::MissingProfile { missing });
        }
    }

    let name = take_string(&mut merged, "name").unwrap_or_else(|| default_name(&email));

    Ok(MergedSubmission {
        email,
        password,
        password2,
        name,
        profile: merged,
    })
}

/// The part of an email address before `@`.
pub fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

/// Remove `key` and return it if it holds a non-blank string.
fn take_string(record: &mut Record, key: &str) -> Option<String> {
    match record.remove(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
