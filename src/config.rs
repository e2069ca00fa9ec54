//! Gateway configuration.
//!
//! Built once at startup from the module argument string, then shared
//! read-only by every component.
//!
//! ```text
//! -basedir <dir>              output directory   [default: /run/snapgate/publish]
//! -subprefix <text>           namespace prefix copied into every snapshot
//! -staging-max-age <seconds>  remove older staging files at startup
//! -sync                       fsync each snapshot before committing it
//! ```

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::diag::bounded_line;
use crate::error::ConfigError;

/// Default output directory.
pub const DEFAULT_BASEDIR: &str = "/run/snapgate/publish";

/// Immutable gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    basedir: PathBuf,
    subprefix: Option<String>,
    publisher_host: String,
    sync_on_write: bool,
    staging_max_age: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASEDIR)
    }
}

impl GatewayConfig {
    /// Configuration with the given output directory and defaults elsewhere.
    ///
    /// The publishing host name is taken from the operating system.
    #[must_use]
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            subprefix: None,
            publisher_host: local_hostname(),
            sync_on_write: false,
            staging_max_age: None,
        }
    }

    /// Parse a module argument string.
    ///
    /// The string is split like a shell command line, so quoting and
    /// backslash escapes work: `-subprefix "site a"`. Each word then has
    /// `~`, `$VAR` and `${VAR}` expanded; an unset variable is an error.
    pub fn from_module_args(args: &str) -> Result<Self, ConfigError> {
        let words = shell_words::split(args)
            .map_err(|e| ConfigError::Expansion {
                message: e.to_string(),
            })?
            .iter()
            .map(|w| expand_word(w))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_words(&words)
    }

    /// Parse already split and expanded argument words.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let mut iter = words.iter().map(|w| w.as_ref()).enumerate();

        while let Some((idx, word)) = iter.next() {
            match word {
                "-basedir" => {
                    cfg.basedir = PathBuf::from(required_value(word, iter.next())?);
                }
                "-subprefix" => {
                    cfg.subprefix = Some(required_value(word, iter.next())?.to_string());
                }
                "-staging-max-age" => {
                    let value = required_value(word, iter.next())?;
                    let secs: u64 = value.parse().map_err(|e: std::num::ParseIntError| {
                        ConfigError::InvalidValue {
                            option: word.to_string(),
                            value: value.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    cfg.staging_max_age = Some(Duration::from_secs(secs));
                }
                "-sync" => cfg.sync_on_write = true,
                other => {
                    return Err(ConfigError::UnknownOption {
                        position: idx + 1,
                        option: other.to_string(),
                    });
                }
            }
        }

        cfg.validate()
    }

    /// Reject configurations the publisher cannot work with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.basedir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyBasedir);
        }
        Ok(self)
    }

    #[must_use]
    /// Set the namespace prefix.
    pub fn with_subprefix(mut self, subprefix: impl Into<String>) -> Self {
        self.subprefix = Some(subprefix.into());
        self
    }

    #[must_use]
    /// Override the publishing host name.
    pub fn with_publisher_host(mut self, host: impl Into<String>) -> Self {
        self.publisher_host = host.into();
        self
    }

    #[must_use]
    /// Fsync each snapshot before the rename.
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    #[must_use]
    /// Sweep staging files older than `max_age` at startup.
    pub fn with_staging_max_age(mut self, max_age: Duration) -> Self {
        self.staging_max_age = Some(max_age);
        self
    }

    /// Output directory.
    #[must_use]
    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    /// Namespace prefix, if configured.
    #[must_use]
    pub fn subprefix(&self) -> Option<&str> {
        self.subprefix.as_deref()
    }

    /// Host name written into every snapshot.
    #[must_use]
    pub fn publisher_host(&self) -> &str {
        &self.publisher_host
    }

    /// Whether snapshots are fsynced before the rename.
    #[must_use]
    pub const fn sync_on_write(&self) -> bool {
        self.sync_on_write
    }

    /// Age beyond which staging files are swept at startup; `None` disables it.
    #[must_use]
    pub const fn staging_max_age(&self) -> Option<Duration> {
        self.staging_max_age
    }

    /// The `basedir` and `subprefix` lines logged at load time.
    ///
    /// Each is a single bounded line even if a value contains line breaks.
    #[must_use]
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!("basedir = '{}'", self.basedir.display()),
            format!("subprefix = '{}'", self.subprefix().unwrap_or_default()),
        ]
        .map(|line| bounded_line(&line).into_owned())
    }

    /// Log the effective configuration.
    pub fn log_summary(&self) {
        for line in self.summary_lines() {
            info!("{line}");
        }
        info!(
            publisher_host = %bounded_line(&self.publisher_host),
            sync_on_write = self.sync_on_write,
            staging_max_age_secs = self.staging_max_age.map(|d| d.as_secs()),
            "gateway configured"
        );
    }
}

fn required_value<'a>(option: &str, next: Option<(usize, &'a str)>) -> Result<&'a str, ConfigError> {
    next.map(|(_, v)| v).ok_or_else(|| ConfigError::MissingValue {
        option: option.to_string(),
    })
}

fn expand_word(word: &str) -> Result<String, ConfigError> {
    shellexpand::full(word)
        .map(Cow::into_owned)
        .map_err(|e| ConfigError::Expansion {
            message: e.to_string(),
        })
}

fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::MAX_DIAGNOSTIC_BYTES;

    #[test]
    fn test_defaults() {
        let cfg = GatewayConfig::from_module_args("").unwrap();
        assert_eq!(cfg.basedir(), Path::new(DEFAULT_BASEDIR));
        assert_eq!(cfg.subprefix(), None);
        assert!(!cfg.sync_on_write());
        assert_eq!(cfg.staging_max_age(), None);
    }

    #[test]
    fn test_parse_options() {
        let cfg = GatewayConfig::from_module_args(
            "-basedir /var/spool/snap -subprefix 'site a' -staging-max-age 600 -sync",
        )
        .unwrap();
        assert_eq!(cfg.basedir(), Path::new("/var/spool/snap"));
        assert_eq!(cfg.subprefix(), Some("site a"));
        assert_eq!(cfg.staging_max_age(), Some(Duration::from_secs(600)));
        assert!(cfg.sync_on_write());
    }

    #[test]
    fn test_unknown_option_reports_position() {
        let err = GatewayConfig::from_module_args("-subprefix x -verbose").unwrap_err();
        match err {
            ConfigError::UnknownOption { position, option } => {
                assert_eq!(position, 3);
                assert_eq!(option, "-verbose");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_value() {
        let err = GatewayConfig::from_module_args("-basedir").unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { .. }));
    }

    #[test]
    fn test_invalid_max_age() {
        let err = GatewayConfig::from_module_args("-staging-max-age soon").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unbalanced_quotes_fail_expansion() {
        let err = GatewayConfig::from_module_args("-subprefix 'oops").unwrap_err();
        assert!(matches!(err, ConfigError::Expansion { .. }));
    }

    #[test]
    fn test_empty_basedir_rejected() {
        let err = GatewayConfig::from_module_args("-basedir ''").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyBasedir));
    }

    #[test]
    fn test_env_and_tilde_expansion() {
        std::env::set_var("SNAPGATE_TEST_SNAP_DIR", "/srv/snap");
        let cfg = GatewayConfig::from_module_args(
            "-basedir $SNAPGATE_TEST_SNAP_DIR/publish -subprefix ${SNAPGATE_TEST_SNAP_DIR}",
        )
        .unwrap();
        assert_eq!(cfg.basedir(), Path::new("/srv/snap/publish"));
        assert_eq!(cfg.subprefix(), Some("/srv/snap"));

        let cfg = GatewayConfig::from_module_args("-basedir ~/publish").unwrap();
        assert_eq!(cfg.basedir(), Path::new(shellexpand::tilde("~/publish").as_ref()));
    }

    #[test]
    fn test_unset_variable_fails_expansion() {
        std::env::remove_var("SNAPGATE_TEST_UNSET_VAR");
        let err = GatewayConfig::from_module_args("-basedir $SNAPGATE_TEST_UNSET_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::Expansion { .. }));
    }

    #[test]
    fn test_oversized_multiline_option_reports_one_bounded_line() {
        let word = format!("-x{}\nsecond line", "y".repeat(10_000));
        let err = GatewayConfig::from_module_args(&format!("'{word}'")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOption { position: 1, .. }));

        let line = err.diagnostic();
        assert!(line.len() <= MAX_DIAGNOSTIC_BYTES);
        assert!(!line.contains('\n'));
        assert!(line.starts_with("Unknown option #1 '-xyyy"));
    }

    #[test]
    fn test_summary_lines_are_single_bounded_lines() {
        let cfg = GatewayConfig::new("/srv/a\nb").with_subprefix("z".repeat(5000));
        let [basedir, subprefix] = cfg.summary_lines();
        assert_eq!(basedir, "basedir = '/srv/a b'");
        assert!(subprefix.starts_with("subprefix = 'zzz"));
        assert_eq!(subprefix.len(), MAX_DIAGNOSTIC_BYTES);
    }

    #[test]
    fn test_from_words() {
        let cfg = GatewayConfig::from_words(&["-subprefix", "dc1"][..]).unwrap();
        assert_eq!(cfg.subprefix(), Some("dc1"));
    }
}
