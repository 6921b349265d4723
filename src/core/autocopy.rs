//! AM-to-PM carry-forward for session entry forms.
//!
//! Typing an AM count pre-fills the matching PM count so a teacher whose class
//! didn't change over lunch enters each number once. A PM count the teacher has
//! edited is never overwritten.

use serde::{Deserialize, Serialize};

/// Which gender count of a session an input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male present count
    Male,
    /// Female present count
    Female,
}

/// Present counts for one session of one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    /// Male students present
    pub males: u32,
    /// Female students present
    pub females: u32,
}

impl SessionCounts {
    /// Value for one gender.
    #[must_use]
    pub const fn get(&self, gender: Gender) -> u32 {
        match gender {
            Gender::Male => self.males,
            Gender::Female => self.females,
        }
    }

    fn slot(&mut self, gender: Gender) -> &mut u32 {
        match gender {
            Gender::Male => &mut self.males,
            Gender::Female => &mut self.females,
        }
    }

    /// Students present across both genders.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.males + self.females
    }
}

/// Value-only carry-forward rule.
///
/// Returns the PM value to show after AM changed from `previous_am` to `am`:
/// AM is copied when it is positive and PM is still 0 or still tracking the
/// old AM value. Otherwise PM is returned untouched. A PM that was
/// deliberately set to 0 can't be told apart from an empty one here;
/// [`SessionForm`] tracks edits instead and doesn't use this rule.
#[must_use]
pub const fn carry_forward(am: u32, previous_am: u32, pm: u32) -> u32 {
    if am > 0 && (pm == 0 || pm == previous_am) {
        am
    } else {
        pm
    }
}

/// Form state of one class's AM and PM counts, clamped to the class roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionForm {
    /// Enrolled counts, the upper bound of every input
    pub roster: SessionCounts,
    /// Current AM inputs
    pub am: SessionCounts,
    /// Current PM inputs
    pub pm: SessionCounts,
    pm_male_touched: bool,
    pm_female_touched: bool,
}

impl SessionForm {
    /// Empty form for a class with `males` and `females` enrolled.
    #[must_use]
    pub fn new(males: u32, females: u32) -> Self {
        Self {
            roster: SessionCounts { males, females },
            ..Self::default()
        }
    }

    /// Whether the teacher has edited this gender's PM count directly.
    #[must_use]
    pub const fn pm_touched(&self, gender: Gender) -> bool {
        match gender {
            Gender::Male => self.pm_male_touched,
            Gender::Female => self.pm_female_touched,
        }
    }

    /// Records an AM input and carries it into PM when PM hasn't been edited.
    ///
    /// Only the touched flag decides. An untouched PM takes every positive AM
    /// value, including after AM was cleared to 0 and typed again. Clearing AM
    /// leaves PM as it was.
    ///
    /// Returns the clamped AM value that was stored.
    pub fn set_am(&mut self, gender: Gender, value: u32) -> u32 {
        let value = value.min(self.roster.get(gender));
        *self.am.slot(gender) = value;

        if value > 0 && !self.pm_touched(gender) {
            *self.pm.slot(gender) = value;
        }
        value
    }

    /// Records a PM input. From then on AM changes leave this PM count alone.
    ///
    /// Returns the clamped PM value that was stored.
    pub fn set_pm(&mut self, gender: Gender, value: u32) -> u32 {
        let value = value.min(self.roster.get(gender));
        *self.pm.slot(gender) = value;
        match gender {
            Gender::Male => self.pm_male_touched = true,
            Gender::Female => self.pm_female_touched = true,
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carry_forward_into_empty_pm() {
        assert_eq!(carry_forward(20, 0, 0), 20);
    }

    #[test]
    fn test_carry_forward_keeps_diverged_pm() {
        assert_eq!(carry_forward(20, 18, 15), 15);
        // Retriggering with the same AM keeps it too
        assert_eq!(carry_forward(20, 20, 15), 15);
    }

    #[test]
    fn test_carry_forward_follows_tracking_pm() {
        assert_eq!(carry_forward(19, 20, 20), 19);
    }

    #[test]
    fn test_carry_forward_ignores_zero_am() {
        assert_eq!(carry_forward(0, 20, 20), 20);
        assert_eq!(carry_forward(0, 0, 0), 0);
    }

    #[test]
    fn test_form_copies_am_to_pm() {
        let mut form = SessionForm::new(25, 25);
        form.set_am(Gender::Male, 20);
        assert_eq!(form.pm.males, 20);
        // Other gender is independent
        assert_eq!(form.pm.females, 0);

        form.set_am(Gender::Female, 18);
        assert_eq!(form.pm.females, 18);
    }

    #[test]
    fn test_form_keeps_user_set_pm() {
        let mut form = SessionForm::new(25, 25);
        form.set_am(Gender::Male, 20);
        form.set_pm(Gender::Male, 15);
        form.set_am(Gender::Male, 20);
        assert_eq!(form.pm.males, 15);
        form.set_am(Gender::Male, 22);
        assert_eq!(form.pm.males, 15);
    }

    #[test]
    fn test_form_keeps_deliberate_zero_pm() {
        let mut form = SessionForm::new(25, 25);
        form.set_pm(Gender::Female, 0);
        form.set_am(Gender::Female, 12);
        assert_eq!(form.pm.females, 0);
        assert!(form.pm_touched(Gender::Female));
        assert!(!form.pm_touched(Gender::Male));
    }

    #[test]
    fn test_form_clamps_to_roster() {
        let mut form = SessionForm::new(10, 12);
        assert_eq!(form.set_am(Gender::Male, 40), 10);
        assert_eq!(form.am.males, 10);
        assert_eq!(form.pm.males, 10);
        assert_eq!(form.set_pm(Gender::Female, 13), 12);
        assert_eq!(form.pm.total(), 22);
    }

    #[test]
    fn test_form_follows_am_after_clear_and_retype() {
        let mut form = SessionForm::new(25, 25);
        form.set_am(Gender::Male, 20);
        form.set_am(Gender::Male, 0);
        assert_eq!(form.pm.males, 20);

        form.set_am(Gender::Male, 18);
        assert_eq!(form.am.males, 18);
        assert_eq!(form.pm.males, 18);
        assert!(!form.pm_touched(Gender::Male));
    }

    #[test]
    fn test_form_untouched_pm_follows_every_positive_am() {
        let mut form = SessionForm::new(25, 25);
        for value in [5, 12, 3, 25] {
            form.set_am(Gender::Female, value);
            assert_eq!(form.pm.females, value);
        }
    }
}
