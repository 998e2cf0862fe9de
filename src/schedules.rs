//! Schedule definitions — validation, construction, next-run computation.
//!
//! The engine stores and validates schedule definitions; firing them is the
//! host scheduler's job. `next_run_at` is provided so hosts can display and
//! register the next due time without re-implementing the slot arithmetic.

use crate::error::BackupError;
use crate::types::{BackupSchedule, ScheduleFrequency};
use uuid::Uuid;

const DAY_MS: i64 = 86_400_000;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Input for creating a schedule. Missing knobs get the engine defaults:
/// enabled, new-files-only.
#[derive(Debug, Clone)]
pub struct ScheduleDraft {
    pub name: String,
    pub frequency: ScheduleFrequency,
    /// Wall-clock slot in `HH:mm`.
    pub time: String,
    pub folders: Vec<String>,
    pub backup_new_only: bool,
    pub enabled: bool,
}

impl Default for ScheduleDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            frequency: ScheduleFrequency::Daily,
            time: "02:00".to_string(),
            folders: Vec::new(),
            backup_new_only: true,
            enabled: true,
        }
    }
}

/// Validate a schedule name: non-empty after trimming.
pub fn validate_name(name: &str) -> Result<String, BackupError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BackupError::Validation(
            "Please enter a schedule name".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Parse and validate an `HH:mm` time slot. Digits and a single colon only,
/// at most 5 characters, hours 0–23, minutes 0–59.
pub fn parse_time(time: &str) -> Result<(u32, u32), BackupError> {
    let invalid = || BackupError::Validation(format!("Invalid schedule time '{time}', expected HH:mm"));

    if time.len() > 5 || !time.chars().all(|c| c.is_ascii_digit() || c == ':') {
        return Err(invalid());
    }
    let mut parts = time.split(':');
    let (hour_raw, minute_raw) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), None) if !h.is_empty() && !m.is_empty() => (h, m),
        _ => return Err(invalid()),
    };
    let hour: u32 = hour_raw.parse().map_err(|_| invalid())?;
    let minute: u32 = minute_raw.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

/// Validate a draft and build a fresh schedule record.
pub fn build_schedule(draft: ScheduleDraft, now_ms: i64) -> Result<BackupSchedule, BackupError> {
    let name = validate_name(&draft.name)?;
    parse_time(&draft.time)?;

    Ok(BackupSchedule {
        id: Uuid::new_v4().to_string(),
        name,
        frequency: draft.frequency,
        time: draft.time,
        folders: draft.folders,
        backup_new_only: draft.backup_new_only,
        enabled: draft.enabled,
        created_at: now_ms,
        last_run: None,
    })
}

/// Validate an existing record before a full replace.
pub fn validate_schedule(schedule: &BackupSchedule) -> Result<(), BackupError> {
    validate_name(&schedule.name)?;
    parse_time(&schedule.time)?;
    Ok(())
}

/// Next due time for a schedule, in epoch milliseconds. `None` when the
/// schedule is disabled. Weekly schedules run a simplified seven-day cadence
/// from the last run (or now).
pub fn next_run_at(schedule: &BackupSchedule, now_ms: i64) -> Option<i64> {
    if !schedule.enabled {
        return None;
    }
    let (hour, minute) = parse_time(&schedule.time).ok()?;
    let slot_offset = (hour as i64 * 3600 + minute as i64 * 60) * 1000;

    match schedule.frequency {
        ScheduleFrequency::Daily | ScheduleFrequency::Custom => {
            let today_start = now_ms - now_ms.rem_euclid(DAY_MS);
            let slot_today = today_start + slot_offset;
            if slot_today > now_ms {
                Some(slot_today)
            } else {
                Some(slot_today + DAY_MS)
            }
        }
        ScheduleFrequency::Weekly => {
            let base = schedule.last_run.unwrap_or(now_ms);
            Some(base + WEEK_MS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, time: &str) -> ScheduleDraft {
        ScheduleDraft {
            name: name.to_string(),
            time: time.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_times_accepted() {
        assert_eq!(parse_time("02:00").unwrap(), (2, 0));
        assert_eq!(parse_time("23:59").unwrap(), (23, 59));
        assert_eq!(parse_time("0:5").unwrap(), (0, 5));
    }

    #[test]
    fn invalid_times_rejected() {
        for time in ["24:00", "12:60", "ab:cd", "", ":", "12:", ":30", "099:1", "1:2:3", "12-30"] {
            assert!(parse_time(time).is_err(), "{time} should be rejected");
        }
    }

    #[test]
    fn name_must_be_non_empty() {
        assert!(validate_name("  ").is_err());
        assert_eq!(validate_name(" Nightly ").unwrap(), "Nightly");
    }

    #[test]
    fn build_applies_defaults_and_fresh_id() {
        let a = build_schedule(draft("Nightly", "02:00"), 1_700_000_000_000).unwrap();
        let b = build_schedule(draft("Nightly", "02:00"), 1_700_000_000_000).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.enabled);
        assert!(a.backup_new_only);
        assert_eq!(a.created_at, 1_700_000_000_000);
        assert!(a.last_run.is_none());
    }

    #[test]
    fn build_rejects_bad_input() {
        assert!(build_schedule(draft("", "02:00"), 0).is_err());
        assert!(build_schedule(draft("Nightly", "25:00"), 0).is_err());
    }

    #[test]
    fn next_run_daily_picks_next_slot() {
        let mut schedule = build_schedule(draft("Nightly", "02:00"), 0).unwrap();
        // 01:00 on day zero: today's 02:00 slot is still ahead.
        let one_am = 3_600_000;
        assert_eq!(next_run_at(&schedule, one_am), Some(2 * 3_600_000));
        // 03:00: tomorrow's slot.
        let three_am = 3 * 3_600_000;
        assert_eq!(next_run_at(&schedule, three_am), Some(DAY_MS + 2 * 3_600_000));

        schedule.enabled = false;
        assert_eq!(next_run_at(&schedule, one_am), None);
    }

    #[test]
    fn next_run_weekly_from_last_run() {
        let mut schedule = build_schedule(draft("Weekly", "02:00"), 0).unwrap();
        schedule.frequency = ScheduleFrequency::Weekly;
        schedule.last_run = Some(1_000);
        assert_eq!(next_run_at(&schedule, 999_999), Some(1_000 + WEEK_MS));
        schedule.last_run = None;
        assert_eq!(next_run_at(&schedule, 5_000), Some(5_000 + WEEK_MS));
    }
}
