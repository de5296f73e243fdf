//! FlexFit onboarding: registration state machine and submission pipeline.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
pub mod submission;
