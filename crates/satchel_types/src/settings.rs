//! Backup settings singleton.

use serde::{Deserialize, Serialize};

/// How often scheduled backups should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFrequency {
    /// Backups run only on explicit request.
    Manual,
    /// Every 24 hours.
    Daily,
    /// Every 7 days.
    Weekly,
    /// Every 30 days.
    Monthly,
}

impl BackupFrequency {
    /// The schedule interval in milliseconds, or `None` for manual.
    #[must_use]
    pub fn interval_ms(&self) -> Option<u64> {
        const DAY_MS: u64 = 24 * 60 * 60 * 1000;
        match self {
            BackupFrequency::Manual => None,
            BackupFrequency::Daily => Some(DAY_MS),
            BackupFrequency::Weekly => Some(7 * DAY_MS),
            BackupFrequency::Monthly => Some(30 * DAY_MS),
        }
    }
}

/// Process-wide backup configuration.
///
/// Mutated only through the backup engine's `update_settings`, which
/// persists the singleton and re-derives the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSettings {
    /// Master switch for the backup subsystem.
    pub enabled: bool,
    /// Scheduled backup cadence.
    pub frequency: BackupFrequency,
    /// Days a snapshot stays visible in listings.
    pub retention_days: u32,
    /// Whether snapshot payloads are encrypted before upload.
    pub encrypt: bool,
    /// Whether scheduled backups run without an explicit request.
    pub auto_backup: bool,
    /// Whether backups should avoid metered network connections.
    pub network_constrained: bool,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: BackupFrequency::Weekly,
            retention_days: 30,
            encrypt: true,
            auto_backup: false,
            network_constrained: false,
        }
    }
}

/// A partial update to [`BackupSettings`]; unset fields keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    /// New value for `enabled`.
    pub enabled: Option<bool>,
    /// New value for `frequency`.
    pub frequency: Option<BackupFrequency>,
    /// New value for `retention_days`.
    pub retention_days: Option<u32>,
    /// New value for `encrypt`.
    pub encrypt: Option<bool>,
    /// New value for `auto_backup`.
    pub auto_backup: Option<bool>,
    /// New value for `network_constrained`.
    pub network_constrained: Option<bool>,
}

impl SettingsPatch {
    /// Applies this patch to `settings`, overwriting only the set fields.
    pub fn apply(&self, settings: &mut BackupSettings) {
        if let Some(enabled) = self.enabled {
            settings.enabled = enabled;
        }
        if let Some(frequency) = self.frequency {
            settings.frequency = frequency;
        }
        if let Some(retention_days) = self.retention_days {
            settings.retention_days = retention_days;
        }
        if let Some(encrypt) = self.encrypt {
            settings.encrypt = encrypt;
        }
        if let Some(auto_backup) = self.auto_backup {
            settings.auto_backup = auto_backup;
        }
        if let Some(network_constrained) = self.network_constrained {
            settings.network_constrained = network_constrained;
        }
    }
}
