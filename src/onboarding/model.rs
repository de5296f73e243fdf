//! Onboarding context and the answer types collected by each step.

use serde::{Deserialize, Serialize};

use super::choice::{self, ChoiceField, ChoiceKey, Selection};
use crate::error::FlowError;

/// Whether the user entered the app to log in or to create an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryIntent {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    Undisclosed,
}

/// Preferred length of a practice session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionDuration {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlexibilityLevel {
    Low,
    Moderate,
    High,
}

/// How long the user can hold a plank, used as an endurance proxy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlankDuration {
    UnderThirtySeconds,
    ThirtyToSixtySeconds,
    OneToTwoMinutes,
    OverTwoMinutes,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreathingControl {
    Struggling,
    Average,
    Controlled,
}

/// Credentials entered at the credentials step.
///
/// Serialized with the account service's field names.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(rename = "password2")]
    pub password_confirmation: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("password_confirmation", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Demographics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub age: u32,
    pub height_cm: f32,
    pub weight_kg: f32,
}

/// The accumulated answers threaded through the step sequence.
///
/// Each `with_*` method consumes the context and returns the extended one;
/// nothing else mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OnboardingContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryIntent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demographics: Option<Demographics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<SessionDuration>,
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub goals: Selection,
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub body_focus: Selection,
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub motivations: Selection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flexibility_level: Option<FlexibilityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plank_duration: Option<PlankDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breathing_control: Option<BreathingControl>,
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub restrictions: Selection,
}

impl OnboardingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, entry: EntryIntent) -> Self {
        Self {
            entry: Some(entry),
            ..self
        }
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        Self {
            credentials: Some(Credentials {
                email: credentials.email.trim().to_string(),
                ..credentials
            }),
            ..self
        }
    }

    pub fn with_gender(self, gender: Gender) -> Self {
        Self {
            gender: Some(gender),
            ..self
        }
    }

    pub fn with_demographics(self, demographics: Demographics) -> Self {
        let display_name = demographics
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        Self {
            demographics: Some(Demographics {
                display_name,
                ..demographics
            }),
            ..self
        }
    }

    pub fn with_session_duration(self, duration: SessionDuration) -> Self {
        Self {
            session_duration: Some(duration),
            ..self
        }
    }

    pub fn with_experience_level(self, level: ExperienceLevel) -> Self {
        Self {
            experience_level: Some(level),
            ..self
        }
    }

    pub fn with_flexibility_level(self, level: FlexibilityLevel) -> Self {
        Self {
            flexibility_level: Some(level),
            ..self
        }
    }

    pub fn with_plank_duration(self, duration: PlankDuration) -> Self {
        Self {
            plank_duration: Some(duration),
            ..self
        }
    }

    pub fn with_breathing_control(self, control: BreathingControl) -> Self {
        Self {
            breathing_control: Some(control),
            ..self
        }
    }

    pub fn with_goals(self, goals: Selection) -> Result<Self, FlowError> {
        choice::GOALS.validate(&goals)?;
        Ok(Self { goals, ..self })
    }

    pub fn with_body_focus(self, body_focus: Selection) -> Result<Self, FlowError> {
        choice::BODY_FOCUS.validate(&body_focus)?;
        Ok(Self { body_focus, ..self })
    }

    pub fn with_motivations(self, motivations: Selection) -> Result<Self, FlowError> {
        choice::MOTIVATIONS.validate(&motivations)?;
        Ok(Self {
            motivations,
            ..self
        })
    }

    pub fn with_restrictions(self, restrictions: Selection) -> Result<Self, FlowError> {
        choice::RESTRICTIONS.validate(&restrictions)?;
        Ok(Self {
            restrictions,
            ..self
        })
    }

    /// Current selection of a multi-valued field.
    pub fn selection(&self, field: &ChoiceField) -> &Selection {
        match field.key {
            ChoiceKey::Goals => &self.goals,
            ChoiceKey::BodyFocus => &self.body_focus,
            ChoiceKey::Motivation => &self.motivations,
            ChoiceKey::Restrictions => &self.restrictions,
        }
    }

    /// Apply one tap on a multi-valued field through the constraint engine.
    pub fn toggle(self, field: &ChoiceField, label: &str) -> Self {
        let next = field.apply(self.selection(field), label);
        match field.key {
            ChoiceKey::Goals => Self { goals: next, ..self },
            ChoiceKey::BodyFocus => Self {
                body_focus: next,
                ..self
            },
            ChoiceKey::Motivation => Self {
                motivations: next,
                ..self
            },
            ChoiceKey::Restrictions => Self {
                restrictions: next,
                ..self
            },
        }
    }

    /// The profile record: everything collected except credentials, keyed
    /// with the account service's field names.
    pub fn profile_record(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut record = serde_json::Map::new();
        let mut put = |key: &str, value: serde_json::Value| {
            if !value.is_null() {
                record.insert(key.to_string(), value);
            }
        };

        put("gender", to_json(&self.gender));
        if let Some(ref demo) = self.demographics {
            put("name", to_json(&demo.display_name));
            put("age", serde_json::json!(demo.age));
            put("height", serde_json::json!(demo.height_cm));
            put("weight", serde_json::json!(demo.weight_kg));
        }
        put("duration", to_json(&self.session_duration));
        put("experience", to_json(&self.experience_level));
        put("flexibility", to_json(&self.flexibility_level));
        put("plank", to_json(&self.plank_duration));
        put("breathing", to_json(&self.breathing_control));
        for (key, selection) in [
            ("goals", &self.goals),
            ("body_focus", &self.body_focus),
            ("motivation", &self.motivations),
            ("restrictions", &self.restrictions),
        ] {
            if !selection.is_empty() {
                put(key, to_json(selection));
            }
        }
        record
    }
}

fn to_json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
