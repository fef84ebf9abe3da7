//! One-shot detection of the PDF backends available on this host.

use std::env;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::RunConfig;
use crate::fonts;

/// What the export strategies may rely on. Detected once and handed to every strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// A complete font family for `genpdf` resolves.
    pub genpdf_fonts: bool,
    /// The crate was built with the `plaintext-pdf` feature.
    pub plaintext_pdf: bool,
    /// Location of the `wkhtmltopdf` executable.
    pub wkhtmltopdf: Option<PathBuf>,
    /// First browser executable that exists.
    pub browser: Option<PathBuf>,
}

impl Capabilities {
    /// Probes fonts, compiled features, the `PATH` and the configured browser locations.
    pub fn detect(config: &RunConfig) -> Self {
        let capabilities = Self {
            genpdf_fonts: fonts::default_fonts_available(config.fonts_dir.as_deref()),
            plaintext_pdf: cfg!(feature = "plaintext-pdf"),
            wkhtmltopdf: match &config.export.wkhtmltopdf {
                Some(path) => is_executable(path).then(|| path.clone()),
                None => find_on_path("wkhtmltopdf"),
            },
            browser: first_existing(&config.export.browser_paths),
        };
        debug!("Detected export capabilities: {capabilities:?}");
        capabilities
    }
}

/// Looks up `program` in every directory of the `PATH` variable.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| executable_in(&dir, program))
}

fn executable_in(dir: &Path, program: &str) -> Option<PathBuf> {
    let candidate = dir.join(program);
    if is_executable(&candidate) {
        return Some(candidate);
    }
    if cfg!(windows) {
        let candidate = dir.join(format!("{program}.exe"));
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// A regular file that the current platform would let us spawn.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn first_existing(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.iter().find(|path| is_executable(path)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_program(path: &Path) {
        std::fs::write(path, b"#!/bin/sh\n").expect("write");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        }
    }

    #[test]
    fn browser_is_first_existing_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("chromium");
        write_program(&present);
        let paths = vec![dir.path().join("missing"), present.clone(), dir.path().join("later")];
        assert_eq!(first_existing(&paths), Some(present));
        assert_eq!(first_existing(&[]), None);
    }

    #[test]
    fn configured_converter_must_exist() {
        let mut config = RunConfig::default();
        config.export.wkhtmltopdf = Some(PathBuf::from("/nonexistent/wkhtmltopdf"));
        config.export.browser_paths.clear();
        let caps = Capabilities::detect(&config);
        assert_eq!(caps.wkhtmltopdf, None);
        assert_eq!(caps.browser, None);
        assert_eq!(caps.plaintext_pdf, cfg!(feature = "plaintext-pdf"));
    }

    #[test]
    fn executable_lookup_in_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_program(&dir.path().join("wkhtmltopdf"));
        assert!(executable_in(dir.path(), "wkhtmltopdf").is_some());
        assert!(executable_in(dir.path(), "chrome").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn plain_file_on_path_is_not_a_converter() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wkhtmltopdf");
        std::fs::write(&path, b"not a program").expect("write");
        assert_eq!(executable_in(dir.path(), "wkhtmltopdf"), None);

        let mut config = RunConfig::default();
        config.export.wkhtmltopdf = Some(path.clone());
        config.export.browser_paths = vec![path];
        let caps = Capabilities::detect(&config);
        assert_eq!(caps.wkhtmltopdf, None);
        assert_eq!(caps.browser, None);
    }
}
