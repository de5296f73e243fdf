//! Submission: merge the onboarding snapshots and create the remote account.

pub mod client;
pub mod pipeline;
pub mod reconcile;

pub use client::{AccountCreated, AccountService, HttpAccountService};
pub use pipeline::{SessionToken, SubmissionPipeline};
pub use reconcile::{MergeReconciler, MergedSubmission};
