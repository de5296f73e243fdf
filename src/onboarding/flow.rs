//! Step reducer: applies a screen's answer to the context.
//!
//! Screens own rendering; they hand their answer to [`apply_answer`] and get
//! back the extended context together with the advance signal.

use serde::{Deserialize, Serialize};

use super::choice::{self, ChoiceField, Selection};
use super::model::*;
use super::steps::Step;
use crate::error::FlowError;

/// One user interaction on a step screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAnswer {
    Entry { intent: EntryIntent },
    Credentials { credentials: Credentials },
    Gender { gender: Gender },
    Info { demographics: Demographics },
    /// A tap on a label of a multi-valued field.
    Toggle { label: String },
    /// A whole selection restored by the screen (e.g. after back navigation).
    Replace { selection: Selection },
    Experience { level: ExperienceLevel },
    Flexibility { level: FlexibilityLevel },
    Endurance { plank: PlankDuration },
    Breathing { control: BreathingControl },
    SessionDuration { duration: SessionDuration },
}

/// The result of applying an answer.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub context: OnboardingContext,
    /// Whether the step's gate now holds.
    pub can_advance: bool,
    /// The step to navigate to once the user confirms.
    pub next: Option<Step>,
}

/// The multi-valued field edited on `step`, if any.
pub fn choice_field(step: Step) -> Option<&'static ChoiceField> {
    match step {
        Step::Goals => Some(&choice::GOALS),
        Step::BodyFocus => Some(&choice::BODY_FOCUS),
        Step::Motivation => Some(&choice::MOTIVATIONS),
        Step::Restrictions => Some(&choice::RESTRICTIONS),
        _ => None,
    }
}

/// Apply `answer` given on `step` and report whether the step may advance.
pub fn apply_answer(
    step: Step,
    ctx: OnboardingContext,
    answer: StepAnswer,
) -> Result<StepOutcome, FlowError> {
    let context = match (step, answer) {
        (Step::Welcome, StepAnswer::Entry { intent }) => ctx.with_entry(intent),
        (Step::Credentials, StepAnswer::Credentials { credentials }) => {
            ctx.with_credentials(credentials)
        }
        (Step::Gender, StepAnswer::Gender { gender }) => ctx.with_gender(gender),
        (Step::Info, StepAnswer::Info { demographics }) => ctx.with_demographics(demographics),
        (Step::Experience, StepAnswer::Experience { level }) => ctx.with_experience_level(level),
        (Step::Flexibility, StepAnswer::Flexibility { level }) => {
            ctx.with_flexibility_level(level)
        }
        (Step::Endurance, StepAnswer::Endurance { plank }) => ctx.with_plank_duration(plank),
        (Step::Breathing, StepAnswer::Breathing { control }) => {
            ctx.with_breathing_control(control)
        }
        (Step::SessionDuration, StepAnswer::SessionDuration { duration }) => {
            ctx.with_session_duration(duration)
        }
        (step, StepAnswer::Toggle { label }) => {
            let field = choice_field(step).ok_or(FlowError::WrongStep { step })?;
            ctx.toggle(field, &label)
        }
        (step, StepAnswer::Replace { selection }) => match step {
            Step::Goals => ctx.with_goals(selection)?,
            Step::BodyFocus => ctx.with_body_focus(selection)?,
            Step::Motivation => ctx.with_motivations(selection)?,
            Step::Restrictions => ctx.with_restrictions(selection)?,
            _ => return Err(FlowError::WrongStep { step }),
        },
        (step, _) => return Err(FlowError::WrongStep { step }),
    };

    let can_advance = step.can_advance(&context);
    let next = if can_advance { step.next(&context) } else { None };
    Ok(StepOutcome {
        context,
        can_advance,
        next,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::choice::WHOLE_BODY;

    fn toggle(label: &str) -> StepAnswer {
        StepAnswer::Toggle {
            label: label.to_string(),
        }
    }

    #[test]
    fn toggles_follow_constraint_rules() {
        let mut ctx = OnboardingContext::new();
        for label in ["Back", "Core", WHOLE_BODY] {
            ctx = apply_answer(Step::BodyFocus, ctx, toggle(label)).unwrap().context;
        }
        assert_eq!(ctx.body_focus.iter().collect::<Vec<_>>(), vec![WHOLE_BODY]);

        let outcome = apply_answer(Step::BodyFocus, ctx, toggle("Back")).unwrap();
        assert_eq!(outcome.context.body_focus.iter().collect::<Vec<_>>(), vec!["Back"]);
        assert!(outcome.can_advance);
        assert_eq!(outcome.next, Some(Step::Motivation));
    }

    #[test]
    fn emptied_selection_closes_the_gate() {
        let outcome = apply_answer(Step::Goals, OnboardingContext::new(), toggle("Flexibility"))
            .unwrap();
        assert!(outcome.can_advance);

        let outcome = apply_answer(Step::Goals, outcome.context, toggle("Flexibility")).unwrap();
        assert!(!outcome.can_advance);
        assert_eq!(outcome.next, None);
    }

    #[test]
    fn answer_for_another_step_is_rejected() {
        let err = apply_answer(
            Step::Gender,
            OnboardingContext::new(),
            StepAnswer::SessionDuration {
                duration: SessionDuration::Long,
            },
        )
        .unwrap_err();
        assert_eq!(err, FlowError::WrongStep { step: Step::Gender });

        let err = apply_answer(Step::Info, OnboardingContext::new(), toggle("Back")).unwrap_err();
        assert_eq!(err, FlowError::WrongStep { step: Step::Info });
    }

    #[test]
    fn replace_validates_sentinel_exclusivity() {
        let selection: Selection = ["No restrictions", "Hypertension"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = apply_answer(
            Step::Restrictions,
            OnboardingContext::new(),
            StepAnswer::Replace { selection },
        )
        .unwrap_err();
        assert!(matches!(err, FlowError::ConstraintViolation { .. }));
    }

    #[test]
    fn login_skips_collection() {
        let outcome = apply_answer(
            Step::Welcome,
            OnboardingContext::new(),
            StepAnswer::Entry {
                intent: EntryIntent::Login,
            },
        )
        .unwrap();
        assert_eq!(outcome.next, Some(Step::Home));
    }

    #[test]
    fn answer_deserializes_from_screen_json() {
        let answer: StepAnswer =
            serde_json::from_str(r#"{"type": "endurance", "plank": "over_two_minutes"}"#).unwrap();
        let outcome = apply_answer(Step::Endurance, OnboardingContext::new(), answer).unwrap();
        assert_eq!(outcome.context.plank_duration, Some(PlankDuration::OverTwoMinutes));
        assert_eq!(outcome.next, Some(Step::Breathing));
    }
}
