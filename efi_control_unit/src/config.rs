//! Configuration resolution for the control unit binary.
//!
//! An explicit `--config` path must exist and validate. Without one the
//! default system path is tried, and a missing file there falls back to the
//! built-in defaults.

use std::path::Path;

use efi_common::config::{ConfigError, EfiConfig, load_config};
use efi_common::consts::DEFAULT_CONFIG_PATH;
use tracing::warn;

/// Where the running configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(String),
    Defaults,
}

/// Load the configuration named on the command line, or the default one.
pub fn resolve_config(path: Option<&Path>) -> Result<(EfiConfig, ConfigSource), ConfigError> {
    match path {
        Some(path) => {
            let config = load_config(path)?;
            Ok((config, ConfigSource::File(path.display().to_string())))
        }
        None => resolve_default(Path::new(DEFAULT_CONFIG_PATH)),
    }
}

fn resolve_default(path: &Path) -> Result<(EfiConfig, ConfigSource), ConfigError> {
    match load_config(path) {
        Ok(config) => Ok((config, ConfigSource::File(path.display().to_string()))),
        Err(ConfigError::FileNotFound) => {
            warn!(
                "No configuration at {}, running on built-in defaults",
                path.display()
            );
            let config = EfiConfig::default();
            config.validate()?;
            Ok((config, ConfigSource::Defaults))
        }
        Err(e) => Err(e),
    }
}

/// Render the configuration as TOML.
pub fn render_config(config: &EfiConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = resolve_config(Some(Path::new("/nonexistent/efi.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn missing_default_falls_back() {
        let (config, source) = resolve_default(Path::new("/nonexistent/efi.toml")).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.controller.revs_per_calc, 2);
    }

    #[test]
    fn broken_default_is_still_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[controller\nrevs_per_calc = ").unwrap();
        assert!(matches!(
            resolve_default(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn explicit_file_is_used() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[telemetry]
transmit_on_start = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let (config, source) = resolve_config(Some(file.path())).unwrap();
        assert!(config.telemetry.transmit_on_start);
        assert!(matches!(source, ConfigSource::File(_)));
    }

    #[test]
    fn rendered_config_loads_back() {
        let mut config = EfiConfig::default();
        config.feedback.afr.gain = 0.35;
        config.simulation.injector_flow_scale = 1.1;
        let text = render_config(&config).unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();

        let (loaded, _) = resolve_config(Some(file.path())).unwrap();
        assert_eq!(loaded.feedback.afr.gain, 0.35);
        assert_eq!(loaded.simulation.injector_flow_scale, 1.1);
        assert_eq!(loaded.simulation.profile, config.simulation.profile);
    }
}
