pub mod format;
pub mod invoker;
pub mod middleware;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ValidatorConfig;
use invoker::{ProcessValidator, Validator};
use types::Mode;

/// Process-lifetime settings of the validation gate. Immutable once built.
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// Validator executable, `None` when it could not be found at startup
    pub validator_path: Option<PathBuf>,
    pub subcommand: String,
    pub mode: Mode,
    pub security: bool,
    pub best_practices: bool,
    /// Let `dry_run=true` requests through without validation
    pub skip_dry_run: bool,
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl MiddlewareConfig {
    /// Build the gate settings, looking the validator up once
    pub fn resolve(validator: &ValidatorConfig, max_body_bytes: usize) -> Self {
        let validator_path = resolve_executable(&validator.command);
        match &validator_path {
            Some(path) => info!("Using validator at {}", path.display()),
            None => warn!(
                "Validator '{}' not found, configuration updates will not be validated",
                validator.command
            ),
        }

        Self {
            validator_path,
            subcommand: validator.subcommand.clone(),
            mode: validator.mode,
            security: validator.security,
            best_practices: validator.best_practices,
            skip_dry_run: validator.skip_dry_run,
            timeout: Duration::from_secs(validator.timeout_secs),
            max_body_bytes,
        }
    }

    /// The process-backed validator, if an executable was found
    pub fn process_validator(&self) -> Option<ProcessValidator> {
        self.validator_path.as_ref().map(|program| ProcessValidator {
            program: program.clone(),
            subcommand: self.subcommand.clone(),
            mode: self.mode,
            security: self.security,
            best_practices: self.best_practices,
            timeout: self.timeout,
        })
    }
}

/// Shared, read-only state of the validation middleware
#[derive(Clone)]
pub struct ValidationGate {
    pub config: Arc<MiddlewareConfig>,
    pub validator: Option<Arc<dyn Validator>>,
}

impl ValidationGate {
    pub fn new(config: MiddlewareConfig) -> Self {
        let validator = config
            .process_validator()
            .map(|v| Arc::new(v) as Arc<dyn Validator>);
        Self::with_validator(config, validator)
    }

    pub fn with_validator(config: MiddlewareConfig, validator: Option<Arc<dyn Validator>>) -> Self {
        Self {
            config: Arc::new(config),
            validator,
        }
    }

    pub fn is_available(&self) -> bool {
        self.validator.is_some()
    }
}

/// Find an executable by path, or by name on `PATH`
pub fn resolve_executable(command: &str) -> Option<PathBuf> {
    if command.is_empty() {
        return None;
    }

    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_executable() {
        assert_eq!(resolve_executable(""), None);
        assert_eq!(resolve_executable("/nonexistent/dir/validator"), None);
        assert_eq!(resolve_executable("configkeeper-no-such-validator"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_executable_by_path() {
        assert_eq!(resolve_executable("/bin/sh"), Some(PathBuf::from("/bin/sh")));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_executable_on_path() {
        let found = resolve_executable("sh").unwrap();
        assert!(found.ends_with("sh"));
        assert!(found.is_absolute() || found.components().count() > 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_not_resolved() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(resolve_executable(file.path().to_str().unwrap()), None);
    }

    #[test]
    fn test_missing_validator_disables_gate() {
        let mut validator = ValidatorConfig::default();
        validator.command = "/nonexistent/config-validator".into();
        let gate = ValidationGate::new(MiddlewareConfig::resolve(&validator, 1024));
        assert!(!gate.is_available());
        assert!(gate.config.validator_path.is_none());
    }
}
