//! Selection constraint engine for choice fields.
//!
//! Every choice field is tagged with a [`ChoiceCategory`]; the toggle rule for
//! a user's tap is derived from that tag, so body focus and restrictions share
//! one sentinel-exclusive implementation parameterized by their sentinel and
//! label universe.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::FlowError;

/// A multi-valued selection, compared by membership only.
pub type Selection = BTreeSet<String>;

/// Sentinel label for the body-focus field.
pub const WHOLE_BODY: &str = "Whole body";

/// Sentinel label for the restrictions field.
pub const NO_RESTRICTIONS: &str = "No restrictions";

/// How a choice field reacts to selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceCategory {
    /// Exactly one value; selecting replaces.
    Single,
    /// Any number of values; selecting toggles.
    Multi,
    /// Either the sentinel alone or any number of specific values.
    SentinelExclusive { sentinel: &'static str },
}

/// The context slot a choice field reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKey {
    Goals,
    BodyFocus,
    Motivation,
    Restrictions,
}

impl ChoiceKey {
    /// Wire name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::BodyFocus => "body_focus",
            Self::Motivation => "motivation",
            Self::Restrictions => "restrictions",
        }
    }
}

/// Descriptor of a choice field: key, category and label universe.
///
/// An empty `labels` slice means the field accepts free-text labels.
#[derive(Debug, Clone, Copy)]
pub struct ChoiceField {
    pub key: ChoiceKey,
    pub category: ChoiceCategory,
    pub labels: &'static [&'static str],
}

pub const GOALS: ChoiceField = ChoiceField {
    key: ChoiceKey::Goals,
    category: ChoiceCategory::Multi,
    labels: &[],
};

pub const MOTIVATIONS: ChoiceField = ChoiceField {
    key: ChoiceKey::Motivation,
    category: ChoiceCategory::Multi,
    labels: &[],
};

pub const BODY_FOCUS: ChoiceField = ChoiceField {
    key: ChoiceKey::BodyFocus,
    category: ChoiceCategory::SentinelExclusive {
        sentinel: WHOLE_BODY,
    },
    labels: &[
        WHOLE_BODY,
        "Back",
        "Core",
        "Hips",
        "Legs",
        "Arms",
        "Shoulders",
        "Neck",
    ],
};

pub const RESTRICTIONS: ChoiceField = ChoiceField {
    key: ChoiceKey::Restrictions,
    category: ChoiceCategory::SentinelExclusive {
        sentinel: NO_RESTRICTIONS,
    },
    labels: &[
        NO_RESTRICTIONS,
        "Knee injury",
        "Back pain",
        "Hypertension",
        "Wrist pain",
        "Pregnancy",
        "Recent surgery",
    ],
};

/// Apply one selection to a sentinel-exclusive set.
///
/// The result never holds the sentinel together with a specific label, even
/// when `current` does.
pub fn apply_selection(
    current: &Selection,
    candidate: &str,
    all_labels: &[&str],
    whole_sentinel: &str,
) -> Selection {
    let candidate = candidate.trim();
    if !accepts(all_labels, candidate) {
        debug!(candidate, "Ignoring selection outside the label universe");
        return current.clone();
    }

    let sentinel_active = current.len() == 1 && current.contains(whole_sentinel);

    if candidate == whole_sentinel {
        if sentinel_active {
            return Selection::new();
        }
        return Selection::from([candidate.to_string()]);
    }

    if sentinel_active {
        return Selection::from([candidate.to_string()]);
    }

    let mut next = toggle(current, candidate);
    next.remove(whole_sentinel);
    next
}

impl ChoiceField {
    /// The sentinel label, if this field has one.
    pub fn sentinel(&self) -> Option<&'static str> {
        match self.category {
            ChoiceCategory::SentinelExclusive { sentinel } => Some(sentinel),
            _ => None,
        }
    }

    /// Apply a user's selection of `candidate` and return the new selection.
    pub fn apply(&self, current: &Selection, candidate: &str) -> Selection {
        match self.category {
            ChoiceCategory::SentinelExclusive { sentinel } => {
                apply_selection(current, candidate, self.labels, sentinel)
            }
            ChoiceCategory::Multi => {
                let candidate = candidate.trim();
                if !accepts(self.labels, candidate) {
                    debug!(field = self.key.as_str(), candidate, "Ignoring unknown label");
                    return current.clone();
                }
                toggle(current, candidate)
            }
            ChoiceCategory::Single => {
                let candidate = candidate.trim();
                if !accepts(self.labels, candidate) {
                    debug!(field = self.key.as_str(), candidate, "Ignoring unknown label");
                    return current.clone();
                }
                Selection::from([candidate.to_string()])
            }
        }
    }

    /// Check a selection that did not come from [`ChoiceField::apply`].
    pub fn validate(&self, selection: &Selection) -> Result<(), FlowError> {
        if let Some(unknown) = selection.iter().find(|l| !accepts(self.labels, l)) {
            return Err(self.violation(format!("unknown label {unknown:?}")));
        }
        match self.category {
            ChoiceCategory::Single if selection.len() > 1 => {
                Err(self.violation("more than one value selected".to_string()))
            }
            ChoiceCategory::SentinelExclusive { sentinel }
                if selection.contains(sentinel) && selection.len() > 1 =>
            {
                Err(self.violation(format!("{sentinel:?} combined with specific labels")))
            }
            _ => Ok(()),
        }
    }

    fn violation(&self, reason: String) -> FlowError {
        FlowError::ConstraintViolation {
            field: self.key.as_str().to_string(),
            reason,
        }
    }
}

fn accepts(universe: &[&str], candidate: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    universe.is_empty() || universe.contains(&candidate)
}

fn toggle(current: &Selection, candidate: &str) -> Selection {
    let mut next = current.clone();
    if !next.remove(candidate) {
        next.insert(candidate.to_string());
    }
    next
}
