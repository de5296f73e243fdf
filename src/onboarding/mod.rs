//! Onboarding: the step sequence that collects a new user's profile.
//!
//! Screens drive the flow through [`flow::apply_answer`] and
//! [`OnboardingSession`]; the session writes the credentials snapshot after
//! the credentials step and the profile snapshot before submission.

pub mod choice;
pub mod flow;
pub mod model;
pub mod routes;
pub mod session;
pub mod steps;

pub use choice::{ChoiceCategory, ChoiceField, ChoiceKey, Selection, apply_selection};
pub use flow::{StepAnswer, StepOutcome, apply_answer};
pub use model::{Credentials, Demographics, EntryIntent, OnboardingContext};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use session::OnboardingSession;
pub use steps::Step;
