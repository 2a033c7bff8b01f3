use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest accepted preset display name, in characters.
pub const MAX_PRESET_NAME_LEN: usize = 32;

/// Immutable work/break template a session is started from.
///
/// Durations are in minutes. Construct through [`Preset::new`] so that every
/// preset reaching the engine has positive durations and a non-zero cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "work")]
    pub work_minutes: u32,
    #[serde(rename = "break")]
    pub break_minutes: u32,
    #[serde(rename = "long_break")]
    pub long_break_minutes: u32,
    pub cycle_length: u32,
}

impl Preset {
    pub fn new(
        name: impl Into<String>,
        work_minutes: u32,
        break_minutes: u32,
        long_break_minutes: u32,
        cycle_length: u32,
    ) -> Result<Self, ValidationError> {
        let preset = Self {
            name: name.into(),
            work_minutes,
            break_minutes,
            long_break_minutes,
            cycle_length,
        };
        preset.validate()?;
        Ok(preset)
    }

    /// Check durations and cycle length. Deserialized presets bypass `new`,
    /// so catalogs run this before handing a preset out.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.work_minutes == 0 {
            return Err(ValidationError::NonPositiveDuration { field: "work" });
        }
        if self.break_minutes == 0 {
            return Err(ValidationError::NonPositiveDuration { field: "break" });
        }
        if self.long_break_minutes == 0 {
            return Err(ValidationError::NonPositiveDuration { field: "long_break" });
        }
        if self.cycle_length == 0 {
            return Err(ValidationError::ZeroCycleLength);
        }
        Ok(())
    }

    pub fn work_secs(&self) -> u32 {
        self.work_minutes.saturating_mul(60)
    }

    pub fn break_secs(&self) -> u32 {
        self.break_minutes.saturating_mul(60)
    }

    pub fn long_break_secs(&self) -> u32 {
        self.long_break_minutes.saturating_mul(60)
    }

    pub fn field(&self, field: PresetField) -> u32 {
        match field {
            PresetField::Work => self.work_minutes,
            PresetField::Break => self.break_minutes,
            PresetField::LongBreak => self.long_break_minutes,
            PresetField::CycleLength => self.cycle_length,
        }
    }

    fn field_mut(&mut self, field: PresetField) -> &mut u32 {
        match field {
            PresetField::Work => &mut self.work_minutes,
            PresetField::Break => &mut self.break_minutes,
            PresetField::LongBreak => &mut self.long_break_minutes,
            PresetField::CycleLength => &mut self.cycle_length,
        }
    }

    /// Copy with `delta` added to one field, never going below 1.
    pub fn adjusted(&self, field: PresetField, delta: i32) -> Self {
        let value = (i64::from(self.field(field)) + i64::from(delta)).max(1);
        let mut next = self.clone();
        *next.field_mut(field) = u32::try_from(value).unwrap_or(u32::MAX);
        next
    }

    /// Copy of this preset with a different display name.
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Numeric preset fields a subject can adjust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetField {
    Work,
    Break,
    LongBreak,
    CycleLength,
}

impl PresetField {
    /// Column in the `presets` table, identical to the TOML key.
    pub fn column(self) -> &'static str {
        match self {
            PresetField::Work => "work",
            PresetField::Break => "break",
            PresetField::LongBreak => "long_break",
            PresetField::CycleLength => "cycle_length",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            name: "Classic".into(),
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            cycle_length: 4,
        }
    }
}

/// Whether `name` is acceptable as a preset display name.
pub fn validate_preset_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() || name.chars().count() > MAX_PRESET_NAME_LEN {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
            max: MAX_PRESET_NAME_LEN,
        });
    }
    Ok(())
}

/// Catalog key derived from a display name: lowercase, spaces as underscores.
pub fn preset_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_derived_in_seconds() {
        let p = Preset::new("Deep", 50, 10, 30, 3).unwrap();
        assert_eq!(p.work_secs(), 3000);
        assert_eq!(p.break_secs(), 600);
        assert_eq!(p.long_break_secs(), 1800);
    }

    #[test]
    fn zero_durations_are_rejected() {
        assert_eq!(
            Preset::new("x", 0, 5, 15, 4),
            Err(ValidationError::NonPositiveDuration { field: "work" })
        );
        assert_eq!(
            Preset::new("x", 25, 5, 0, 4),
            Err(ValidationError::NonPositiveDuration { field: "long_break" })
        );
        assert_eq!(Preset::new("x", 25, 5, 15, 0), Err(ValidationError::ZeroCycleLength));
    }

    #[test]
    fn adjusting_a_field_never_drops_below_one() {
        let p = Preset::new("Deep", 50, 10, 30, 3).unwrap();
        assert_eq!(p.adjusted(PresetField::Work, 5).work_minutes, 55);
        assert_eq!(p.adjusted(PresetField::Break, -9).break_minutes, 1);
        assert_eq!(p.adjusted(PresetField::Break, -10).break_minutes, 1);
        assert_eq!(p.adjusted(PresetField::CycleLength, i32::MIN).cycle_length, 1);

        let longer = p.adjusted(PresetField::LongBreak, 15);
        assert_eq!(longer.long_break_minutes, 45);
        assert_eq!((longer.work_minutes, longer.cycle_length), (50, 3));
        assert!(longer.validate().is_ok());
    }

    #[test]
    fn preset_names() {
        assert!(validate_preset_name("Morning Study").is_ok());
        assert!(validate_preset_name("   ").is_err());
        assert!(validate_preset_name(&"a".repeat(MAX_PRESET_NAME_LEN + 1)).is_err());
        assert_eq!(preset_key(" Morning Study "), "morning_study");
    }
}
