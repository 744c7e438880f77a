//! Configuration file loading for codejudge
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::builder::DefaultState;
use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX, EXAMPLE_CONFIG};

impl Config {
    /// Load configuration from a file, with environment overrides applied on top
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder().add_source(File::from(path.as_ref()));
        Self::finish(with_env(builder))
    }

    /// Load the given file, or the embedded example when none is given.
    /// Environment overrides apply in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let builder = ConfigBuilder::builder()
                    .add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml));
                Self::finish(with_env(builder))
            }
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let builder =
            ConfigBuilder::builder().add_source(File::from_str(content, FileFormat::Toml));
        Self::finish(builder)
    }

    fn finish(builder: Builder<DefaultState>) -> Result<Self, ConfigError> {
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limits.time_limit_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "default time limit must be positive".to_owned(),
            ));
        }
        let tolerance = self.harness.float_tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "float tolerance must be a non-negative number".to_owned(),
            ));
        }
        if self.docker.container_prefix.is_empty()
            || !self
                .docker
                .container_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "container prefix '{}' must be non-empty and alphanumeric",
                self.docker.container_prefix
            )));
        }

        // Validate all languages have required fields
        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.image.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty image"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref compile) = lang.compile {
                if compile.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty compile command"
                    )));
                }
                if compile.output_name.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty compile output name"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn with_env(builder: Builder<DefaultState>) -> Builder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverKind;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[languages.test]
name = "Test Language"
driver = "python"
image = "python:3.12-alpine"

[languages.test.run]
command = ["python3", "{source}"]
"#;

        let config = Config::parse_toml(toml).unwrap();
        assert!(config.languages.contains_key("test"));
        assert_eq!(config.languages["test"].name, "Test Language");
        assert_eq!(config.languages["test"].driver, DriverKind::Python);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
workspace_root = "/srv/judge"

[docker]
socket = "/run/docker.sock"
container_prefix = "oj"

[server]
bind = "0.0.0.0:9000"

[harness]
float_tolerance = 0.001
stop_on_failure = true

[default_limits]
time_limit_ms = 2000
memory_limit_mb = 128

[languages.cpp]
name = "C++ 17 (GCC)"
driver = "cpp"
image = "gcc:13"

[languages.cpp.compile]
command = ["g++", "-O2", "{source}", "-o", "{output}"]
output_name = "main"

[languages.cpp.run]
command = ["./{binary}"]
"#;

        let config = Config::parse_toml(toml).unwrap();
        assert_eq!(
            config.workspace_root,
            Some(std::path::PathBuf::from("/srv/judge"))
        );
        assert_eq!(config.docker.socket.as_deref(), Some("/run/docker.sock"));
        assert_eq!(config.docker.container_prefix, "oj");
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.harness.float_tolerance, 0.001);
        assert!(config.harness.stop_on_failure);
        assert_eq!(config.default_limits.time_limit_ms, Some(2000));
        assert_eq!(config.default_limits.memory_limit_mb, Some(128));
        assert!(config.languages["cpp"].compile.is_some());
    }

    #[test]
    fn test_default_languages_included() {
        let config = Config::default();
        for id in ["javascript", "python", "java", "cpp"] {
            assert!(config.languages.contains_key(id), "missing {id}");
        }
        assert!(config.languages["java"].is_compiled());
        assert!(config.languages["cpp"].is_compiled());
        assert!(!config.languages["python"].is_compiled());
    }

    #[test]
    fn test_partial_limits_dont_override_unspecified_fields() {
        let config = Config::default();
        let run_limits = config.languages["java"].run.limits.as_ref().unwrap();

        // Only memory and processes are raised for the JVM; the rest must stay
        // unset so they don't override the defaults via with_overrides
        assert_eq!(run_limits.memory_limit_mb, Some(512));
        assert_eq!(run_limits.time_limit_ms, None);
        assert_eq!(run_limits.cpus, None);
    }

    #[test]
    fn test_invalid_empty_name() {
        let toml = r#"
[languages.test]
name = ""
driver = "python"
image = "python"

[languages.test.run]
command = ["python3"]
"#;

        assert!(Config::parse_toml(toml).is_err());
    }

    #[test]
    fn test_invalid_unknown_driver() {
        let toml = r#"
[languages.test]
name = "Ruby"
driver = "ruby"
image = "ruby"

[languages.test.run]
command = ["ruby"]
"#;

        assert!(matches!(
            Config::parse_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_container_prefix() {
        let toml = r#"
[docker]
container_prefix = "bad name; rm"
"#;

        assert!(matches!(
            Config::parse_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_negative_tolerance() {
        let toml = r#"
[harness]
float_tolerance = -1.0
"#;

        assert!(Config::parse_toml(toml).is_err());
    }
}
