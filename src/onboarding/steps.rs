//! Step transition table: the step graph and its advance gates.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::{EntryIntent, OnboardingContext};
use crate::error::FlowError;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// The steps of the onboarding flow.
///
/// Progresses linearly: Welcome → Credentials → Gender → Info → Goals →
/// BodyFocus → Motivation → Experience → Flexibility → Endurance →
/// Breathing → Restrictions → SessionDuration → Submit → Home, except that
/// Welcome jumps straight to Home for a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Welcome,
    Credentials,
    Gender,
    Info,
    Goals,
    BodyFocus,
    Motivation,
    Experience,
    Flexibility,
    Endurance,
    Breathing,
    Restrictions,
    SessionDuration,
    Submit,
    Home,
}

/// Registration steps that collect data, in order.
pub const COLLECTION_STEPS: &[Step] = &[
    Step::Credentials,
    Step::Gender,
    Step::Info,
    Step::Goals,
    Step::BodyFocus,
    Step::Motivation,
    Step::Experience,
    Step::Flexibility,
    Step::Endurance,
    Step::Breathing,
    Step::Restrictions,
    Step::SessionDuration,
];

impl Step {
    /// Requirements of this step that `ctx` does not yet satisfy.
    pub fn missing_fields(&self, ctx: &OnboardingContext) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            Self::Welcome => {
                if ctx.entry.is_none() {
                    missing.push("entry");
                }
            }
            Self::Credentials => match ctx.credentials {
                None => missing.extend(["email", "password", "password_confirmation"]),
                Some(ref creds) => {
                    if !EMAIL_SHAPE.is_match(&creds.email) {
                        missing.push("email");
                    }
                    if creds.password.is_empty() {
                        missing.push("password");
                    }
                    if creds.password_confirmation.is_empty()
                        || creds.password_confirmation != creds.password
                    {
                        missing.push("password_confirmation");
                    }
                }
            },
            Self::Gender => {
                if ctx.gender.is_none() {
                    missing.push("gender");
                }
            }
            Self::Info => match ctx.demographics {
                None => missing.extend(["age", "height_cm", "weight_kg"]),
                Some(ref demo) => {
                    if demo.age == 0 {
                        missing.push("age");
                    }
                    if !(demo.height_cm > 0.0) {
                        missing.push("height_cm");
                    }
                    if !(demo.weight_kg > 0.0) {
                        missing.push("weight_kg");
                    }
                }
            },
            Self::Goals => {
                if ctx.goals.is_empty() {
                    missing.push("goals");
                }
            }
            Self::BodyFocus => {
                if ctx.body_focus.is_empty() {
                    missing.push("body_focus");
                }
            }
            Self::Motivation => {
                if ctx.motivations.is_empty() {
                    missing.push("motivations");
                }
            }
            Self::Experience => {
                if ctx.experience_level.is_none() {
                    missing.push("experience_level");
                }
            }
            Self::Flexibility => {
                if ctx.flexibility_level.is_none() {
                    missing.push("flexibility_level");
                }
            }
            Self::Endurance => {
                if ctx.plank_duration.is_none() {
                    missing.push("plank_duration");
                }
            }
            Self::Breathing => {
                if ctx.breathing_control.is_none() {
                    missing.push("breathing_control");
                }
            }
            Self::Restrictions => {
                if ctx.restrictions.is_empty() {
                    missing.push("restrictions");
                }
            }
            Self::SessionDuration => {
                if ctx.session_duration.is_none() {
                    missing.push("session_duration");
                }
            }
            Self::Submit => {
                for step in COLLECTION_STEPS {
                    missing.extend(step.missing_fields(ctx));
                }
            }
            Self::Home => {}
        }
        missing
    }

    /// Whether the user may leave this step going forward.
    pub fn can_advance(&self, ctx: &OnboardingContext) -> bool {
        !self.is_terminal() && self.missing_fields(ctx).is_empty()
    }

    /// Whether this step ends the flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Home)
    }

    /// The step that follows this one for the given context.
    ///
    /// Only Welcome looks at the context; the rest of the graph is linear.
    pub fn next(&self, ctx: &OnboardingContext) -> Option<Step> {
        use Step::*;
        match self {
            Welcome => match ctx.entry? {
                EntryIntent::Login => Some(Home),
                EntryIntent::Register => Some(Credentials),
            },
            Credentials => Some(Gender),
            Gender => Some(Info),
            Info => Some(Goals),
            Goals => Some(BodyFocus),
            BodyFocus => Some(Motivation),
            Motivation => Some(Experience),
            Experience => Some(Flexibility),
            Flexibility => Some(Endurance),
            Endurance => Some(Breathing),
            Breathing => Some(Restrictions),
            Restrictions => Some(SessionDuration),
            SessionDuration => Some(Submit),
            Submit => Some(Home),
            Home => None,
        }
    }

    /// The step a back action returns to. Gates are not re-checked.
    pub fn previous(&self) -> Option<Step> {
        use Step::*;
        match self {
            Welcome | Home => None,
            Credentials => Some(Welcome),
            Gender => Some(Credentials),
            Info => Some(Gender),
            Goals => Some(Info),
            BodyFocus => Some(Goals),
            Motivation => Some(BodyFocus),
            Experience => Some(Motivation),
            Flexibility => Some(Experience),
            Endurance => Some(Flexibility),
            Breathing => Some(Endurance),
            Restrictions => Some(Breathing),
            SessionDuration => Some(Restrictions),
            Submit => Some(SessionDuration),
        }
    }
}

/// Move forward from `step`, failing if its gate does not hold.
pub fn advance(step: Step, ctx: &OnboardingContext) -> Result<Step, FlowError> {
    if step.is_terminal() {
        return Err(FlowError::Terminal { step });
    }
    let missing = step.missing_fields(ctx);
    if !missing.is_empty() {
        return Err(FlowError::GateNotSatisfied { step, missing });
    }
    step.next(ctx).ok_or(FlowError::Terminal { step })
}

impl Default for Step {
    fn default() -> Self {
        Self::Welcome
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Welcome => "welcome",
            Self::Credentials => "credentials",
            Self::Gender => "gender",
            Self::Info => "info",
            Self::Goals => "goals",
            Self::BodyFocus => "body_focus",
            Self::Motivation => "motivation",
            Self::Experience => "experience",
            Self::Flexibility => "flexibility",
            Self::Endurance => "endurance",
            Self::Breathing => "breathing",
            Self::Restrictions => "restrictions",
            Self::SessionDuration => "session_duration",
            Self::Submit => "submit",
            Self::Home => "home",
        };
        write!(f, "{s}")
    }
}
