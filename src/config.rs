use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{AutoProcessorError, AutoProcessorResult};

/// Environment variable that points at an explicit config file.
pub const CONFIG_ENV: &str = "AUTOPROCESSOR_CONFIG";

/// Environment variable that overrides `[replay].page`.
pub const PAGE_ENV: &str = "AUTOPROCESSOR_PAGE";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub selectors: SelectorsConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
}

/// Fixed waits used to synchronise with the host page. None of these are
/// observable from the outside, so they are plain durations, not deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Quiet period of the scan debounce.
    pub debounce_ms: u64,
    /// Wait after activating the edit control, before looking for the option group.
    pub dialog_render_ms: u64,
    /// Wait after selecting "No", before looking for the submit control.
    pub option_settle_ms: u64,
    /// Wait after submitting, before restoring focus to the scan input.
    pub dialog_close_ms: u64,
    /// Poll interval while waiting for the scan input / table body to exist.
    pub bootstrap_retry_ms: u64,
    pub commit_followups_ms: Vec<u64>,
    pub checkin_followups_ms: Vec<u64>,
    pub mutation_followups_ms: Vec<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            dialog_render_ms: 500,
            option_settle_ms: 300,
            dialog_close_ms: 1500,
            bootstrap_retry_ms: 1000,
            commit_followups_ms: vec![1500, 2500, 3500],
            checkin_followups_ms: vec![1500, 2500],
            mutation_followups_ms: vec![500],
        }
    }
}

impl TimingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn dialog_render(&self) -> Duration {
        Duration::from_millis(self.dialog_render_ms)
    }

    pub fn option_settle(&self) -> Duration {
        Duration::from_millis(self.option_settle_ms)
    }

    pub fn dialog_close(&self) -> Duration {
        Duration::from_millis(self.dialog_close_ms)
    }

    pub fn bootstrap_retry(&self) -> Duration {
        Duration::from_millis(self.bootstrap_retry_ms)
    }

    /// All waits set to zero; follow-up schedules collapse to a single immediate request.
    pub fn immediate() -> Self {
        Self {
            debounce_ms: 0,
            dialog_render_ms: 0,
            option_settle_ms: 0,
            dialog_close_ms: 0,
            bootstrap_retry_ms: 0,
            commit_followups_ms: vec![0],
            checkin_followups_ms: vec![0],
            mutation_followups_ms: vec![0],
        }
    }
}

/// CSS selectors for the host page's structural class markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    pub table_body: String,
    pub row: String,
    pub cell: String,
    pub control: String,
    pub option_group: String,
    pub option_wrapper: String,
    pub option_input: String,
    pub dialog_footer: String,
    pub primary_control: String,
    pub scan_input: String,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            table_body: ".lazada-logistics-table-body tbody".into(),
            row: "tr.lazada-logistics-table-row".into(),
            cell: "td".into(),
            control: "button".into(),
            option_group: "#dialogReattempt".into(),
            option_wrapper: ".lazada-logistics-radio-wrapper".into(),
            option_input: "input[type=\"radio\"]".into(),
            dialog_footer: ".lazada-logistics-dialog-footer".into(),
            primary_control: ".lazada-logistics-btn-primary".into(),
            scan_input: "#trackingNumber".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    /// Substring of the per-row control that opens the edit dialog.
    pub edit: String,
    /// Exact label of the control whose activation hints that rows were added.
    pub check_in: String,
    /// Key that commits a value typed (or scanned) into the scan input.
    pub commit_key: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            edit: "Edit".into(),
            check_in: "Check-in".into(),
            commit_key: "Enter".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub min_cells: usize,
    pub identity_column: usize,
    pub attempts_column: usize,
    pub reason_column: usize,
    /// When true, a missing submit control leaves the row retryable instead of
    /// recording it as completed.
    pub require_submit: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            min_cells: 11,
            identity_column: 0,
            attempts_column: 5,
            reason_column: 6,
            require_submit: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// HTML snapshot of the host page to monitor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PathBuf>,
    /// How long a replay session keeps running before shutting down.
    pub session_secs: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            page: None,
            session_secs: 10,
        }
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        let candidate = PathBuf::from(explicit);
        tracing::debug!(path = %candidate.display(), "config path taken from {CONFIG_ENV}");
        return Some(candidate);
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in working directory");
            return Some(candidate);
        }
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("autoprocessor").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Some(candidate);
        }
    }

    None
}

pub fn parse_config(content: &str) -> AutoProcessorResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> AutoProcessorResult<AppConfig> {
    let mut config = match resolve_config_path() {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            let config = parse_config(&content)?;
            tracing::info!(path = %path.display(), "config loaded");
            config
        }
        None => {
            tracing::info!("no config.toml found; using built-in defaults");
            AppConfig::default()
        }
    };

    if let Ok(page) = std::env::var(PAGE_ENV) {
        config.replay.page = Some(PathBuf::from(page));
    }
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &std::path::Path) -> AutoProcessorResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

impl AppConfig {
    fn validate(&self) -> AutoProcessorResult<()> {
        let p = &self.processing;
        let highest = p.identity_column.max(p.attempts_column).max(p.reason_column);
        if highest >= p.min_cells {
            return Err(AutoProcessorError::Config(format!(
                "column index {highest} is outside min_cells = {}",
                p.min_cells
            )));
        }
        if self.labels.edit.trim().is_empty() {
            return Err(AutoProcessorError::Config("labels.edit must not be empty".into()));
        }
        Ok(())
    }
}
