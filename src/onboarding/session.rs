//! OnboardingSession: coordinates step gates with snapshot writes and the
//! terminal submission.
//!
//! The session holds no context of its own; screens pass the current
//! [`OnboardingContext`] into every call.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::flow::{self, StepAnswer, StepOutcome};
use super::model::{EntryIntent, OnboardingContext};
use super::steps::{self, Step};
use crate::error::{Error, FlowError, StorageError, SubmissionError};
use crate::store::snapshots::{Record, SnapshotKey, SnapshotStore};
use crate::submission::{SessionToken, SubmissionPipeline};

pub struct OnboardingSession {
    id: Uuid,
    snapshots: SnapshotStore,
    pipeline: Arc<SubmissionPipeline>,
    clear_stale_on_start: bool,
}

impl OnboardingSession {
    pub fn new(snapshots: SnapshotStore, pipeline: Arc<SubmissionPipeline>) -> Self {
        Self {
            id: Uuid::new_v4(),
            snapshots,
            pipeline,
            clear_stale_on_start: true,
        }
    }

    /// Whether `begin` discards snapshots left by an abandoned attempt.
    pub fn with_clear_stale_on_start(mut self, clear: bool) -> Self {
        self.clear_stale_on_start = clear;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Answer the welcome step with a fresh context.
    ///
    /// A registration clears stale snapshots first (when configured), so a
    /// previous attempt's credentials cannot leak into this one.
    pub async fn begin(&self, intent: EntryIntent) -> Result<StepOutcome, Error> {
        if intent == EntryIntent::Register && self.clear_stale_on_start {
            let removed = self.snapshots.clear_all().await?;
            if removed > 0 {
                info!(session = %self.id, removed, "Cleared snapshots from an abandoned registration");
            }
        }
        let outcome = flow::apply_answer(
            Step::Welcome,
            OnboardingContext::new(),
            StepAnswer::Entry { intent },
        )?;
        info!(session = %self.id, ?intent, "Onboarding started");
        Ok(outcome)
    }

    /// Apply a screen's answer. Pure; nothing is persisted.
    pub fn answer(
        &self,
        step: Step,
        ctx: OnboardingContext,
        answer: StepAnswer,
    ) -> Result<StepOutcome, Error> {
        Ok(flow::apply_answer(step, ctx, answer)?)
    }

    /// Leave `step` going forward.
    ///
    /// Fails if the step's gate does not hold, or if the snapshot write tied
    /// to this transition fails; in both cases the user stays on `step`.
    /// Submit is left only through [`OnboardingSession::submit`].
    pub async fn advance(&self, step: Step, ctx: &OnboardingContext) -> Result<Step, Error> {
        if step == Step::Submit {
            return Err(FlowError::AwaitsSubmission { step }.into());
        }
        let next = steps::advance(step, ctx)?;

        if step == Step::Credentials {
            self.write_credentials(ctx).await?;
        }
        if next == Step::Submit {
            self.snapshots
                .write_snapshot(SnapshotKey::Profile, &ctx.profile_record())
                .await?;
        }

        debug!(session = %self.id, from = %step, to = %next, "Step advanced");
        Ok(next)
    }

    /// Run the terminal step: reconcile the snapshots and submit.
    pub async fn submit(&self) -> Result<SessionToken, SubmissionError> {
        info!(session = %self.id, "Submitting onboarding");
        self.pipeline.resubmit().await
    }

    async fn write_credentials(&self, ctx: &OnboardingContext) -> Result<(), StorageError> {
        let value = serde_json::to_value(&ctx.credentials)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let record: Record = match value {
            serde_json::Value::Object(map) => map,
            _ => Record::new(),
        };
        self.snapshots
            .write_snapshot(SnapshotKey::Credentials, &record)
            .await
    }
}
