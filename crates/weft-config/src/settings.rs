//! Settings file loading.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Engine-wide settings.
///
/// All fields are plain strings taken verbatim from the settings file.
/// Empty means the setting was absent or malformed; downstream components
/// report the consequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Directory of workflow definition files (`*.xml`).
    pub workflows_folder: String,
    /// Directory deleted definition files are moved to by front-ends.
    pub trash_folder: String,
    /// Scratch directory handed to workflow runs. Created if absent.
    pub temp_folder: String,
    /// Path to the workflow XML schema document.
    pub xsd: String,
    /// JSON catalog of known task kinds.
    pub tasks_names_file: String,
    /// JSON catalog of required task parameters per kind.
    pub tasks_settings_file: String,
    /// Passed verbatim to the persistence layer.
    pub connection_string: String,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// Never fails: an unreadable or unparsable file yields all-empty
    /// settings, and each individually missing or non-string value becomes
    /// `""`. Both cases are logged.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read settings file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        let settings = Self::from_toml_str(&contents);
        info!("Settings loaded from {}", path.display());
        settings.ensure_temp_folder();
        settings
    }

    /// Parse settings from a TOML string.
    pub fn from_toml_str(contents: &str) -> Self {
        let table: toml::Value = match contents.parse() {
            Ok(v) => v,
            Err(e) => {
                warn!("Malformed settings document: {}", e);
                return Self::default();
            }
        };

        Self {
            workflows_folder: string_setting(&table, "workflows_folder"),
            trash_folder: string_setting(&table, "trash_folder"),
            temp_folder: string_setting(&table, "temp_folder"),
            xsd: string_setting(&table, "xsd"),
            tasks_names_file: string_setting(&table, "tasks_names_file"),
            tasks_settings_file: string_setting(&table, "tasks_settings_file"),
            connection_string: string_setting(&table, "connection_string"),
        }
    }

    /// Create the temp folder if it doesn't exist yet.
    fn ensure_temp_folder(&self) {
        if self.temp_folder.is_empty() {
            return;
        }
        let path = Path::new(&self.temp_folder);
        if !path.exists() {
            if let Err(e) = std::fs::create_dir_all(path) {
                warn!("Failed to create temp folder {}: {}", path.display(), e);
            }
        }
    }

    /// The workflows folder as a path.
    pub fn workflows_dir(&self) -> PathBuf {
        PathBuf::from(&self.workflows_folder)
    }

    /// The temp folder as a path.
    pub fn temp_dir(&self) -> PathBuf {
        PathBuf::from(&self.temp_folder)
    }
}

/// Extract one string setting, warning when it is absent or not a string.
fn string_setting(table: &toml::Value, key: &str) -> String {
    match table.get(key) {
        Some(toml::Value::String(s)) => s.clone(),
        Some(other) => {
            warn!("Setting '{}' is not a string (found {}), using \"\"", key, other.type_str());
            String::new()
        }
        None => {
            warn!("Setting '{}' is missing, using \"\"", key);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
workflows_folder = "/var/lib/weft/workflows"
trash_folder = "/var/lib/weft/trash"
temp_folder = "/var/lib/weft/temp"
xsd = "/etc/weft/workflow.xsd"
tasks_names_file = "/etc/weft/tasks_names.json"
tasks_settings_file = "/etc/weft/tasks_settings.json"
connection_string = "/var/lib/weft/weft.db"
"#;

    #[test]
    fn test_parse_full_document() {
        let s = Settings::from_toml_str(FULL);
        assert_eq!(s.workflows_folder, "/var/lib/weft/workflows");
        assert_eq!(s.trash_folder, "/var/lib/weft/trash");
        assert_eq!(s.temp_folder, "/var/lib/weft/temp");
        assert_eq!(s.xsd, "/etc/weft/workflow.xsd");
        assert_eq!(s.tasks_names_file, "/etc/weft/tasks_names.json");
        assert_eq!(s.tasks_settings_file, "/etc/weft/tasks_settings.json");
        assert_eq!(s.connection_string, "/var/lib/weft/weft.db");
    }

    #[test]
    fn test_missing_setting_becomes_empty() {
        let s = Settings::from_toml_str(r#"workflows_folder = "/wf""#);
        assert_eq!(s.workflows_folder, "/wf");
        assert_eq!(s.connection_string, "");
        assert_eq!(s.trash_folder, "");
    }

    #[test]
    fn test_wrong_type_becomes_empty() {
        let s = Settings::from_toml_str("workflows_folder = 42\nconnection_string = \"db\"");
        assert_eq!(s.workflows_folder, "");
        assert_eq!(s.connection_string, "db");
    }

    #[test]
    fn test_malformed_document_yields_defaults() {
        let s = Settings::from_toml_str("this is not { toml");
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_unreadable_file_yields_defaults() {
        let s = Settings::load(Path::new("/nonexistent/weft.toml"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_load_creates_temp_folder() {
        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("scratch");
        let settings_path = dir.path().join("weft.toml");
        std::fs::write(
            &settings_path,
            format!("temp_folder = \"{}\"\n", temp.display()),
        )
        .unwrap();

        let s = Settings::load(&settings_path);
        assert_eq!(s.temp_folder, temp.display().to_string());
        assert!(temp.exists());
    }
}
