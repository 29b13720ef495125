//! Backup scheduling.
//!
//! The schedule is anchored to the persisted last-backup timestamp, not
//! to process start, so restarts neither skip nor double-run a period.

use satchel_types::BackupSettings;

/// When the next scheduled backup is due (Unix milliseconds), or `None`
/// if scheduled backups are off.
///
/// With no prior backup on record, the first one is due immediately.
#[must_use]
pub fn next_due(settings: &BackupSettings, last_backup_at: Option<u64>, now_ms: u64) -> Option<u64> {
    if !settings.enabled || !settings.auto_backup {
        return None;
    }
    let interval = settings.frequency.interval_ms()?;
    match last_backup_at {
        None => Some(now_ms),
        Some(last) => Some(last.saturating_add(interval)),
    }
}

/// Whether a scheduled backup is due at `now_ms`.
#[must_use]
pub fn is_due(settings: &BackupSettings, last_backup_at: Option<u64>, now_ms: u64) -> bool {
    next_due(settings, last_backup_at, now_ms).is_some_and(|due| due <= now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_types::BackupFrequency;

    const DAY_MS: u64 = 86_400_000;

    fn scheduled() -> BackupSettings {
        BackupSettings {
            enabled: true,
            auto_backup: true,
            frequency: BackupFrequency::Daily,
            ..BackupSettings::default()
        }
    }

    #[test]
    fn disabled_is_never_due() {
        let settings = BackupSettings::default();
        assert!(!is_due(&settings, None, 1_000));
        assert_eq!(next_due(&settings, None, 1_000), None);
    }

    #[test]
    fn auto_backup_off_is_never_due() {
        let settings = BackupSettings {
            enabled: true,
            auto_backup: false,
            ..BackupSettings::default()
        };
        assert!(!is_due(&settings, None, 1_000));
    }

    #[test]
    fn manual_frequency_is_never_due() {
        let settings = BackupSettings {
            frequency: BackupFrequency::Manual,
            ..scheduled()
        };
        assert!(!is_due(&settings, None, 1_000));
    }

    #[test]
    fn first_backup_is_due_immediately() {
        assert!(is_due(&scheduled(), None, 1_000));
    }

    #[test]
    fn due_anchors_to_last_run() {
        let settings = scheduled();
        let last = 10 * DAY_MS;
        assert!(!is_due(&settings, Some(last), last + DAY_MS - 1));
        assert!(is_due(&settings, Some(last), last + DAY_MS));
        assert_eq!(next_due(&settings, Some(last), last), Some(last + DAY_MS));
    }

    #[test]
    fn missed_periods_do_not_stack() {
        // Three missed days still mean exactly one due backup.
        let settings = scheduled();
        let last = DAY_MS;
        assert!(is_due(&settings, Some(last), last + 3 * DAY_MS));
    }
}
