//! Font loading for the `genpdf` backend.
//!
//! The proportional family is looked up in this order:
//!
//! 1. the `fonts_dir` of the run configuration,
//! 2. `assets/fonts` next to the running executable,
//! 3. `assets/fonts` in the crate source tree,
//! 4. a platform family (DejaVu Sans, Arial) in the usual system font directories.
//!
//! The first three locations must hold all four `Roboto-*.ttf` styles. A monospace family for
//! preformatted text is optional and searched the same way (`RobotoMono-*.ttf`, then DejaVu Sans
//! Mono or Consolas).

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Name of the optional bundled monospace family.
pub const MONOSPACE_FONT_FAMILY_NAME: &str = "RobotoMono";

const STYLE_SUFFIXES: [&str; 4] = ["Regular", "Bold", "Italic", "BoldItalic"];

/// A font family installed with the operating system.
struct SystemFamily {
    name: &'static str,
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

impl SystemFamily {
    fn files(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }
}

const SYSTEM_FAMILIES: &[SystemFamily] = &[
    SystemFamily {
        name: "DejaVu Sans",
        regular: "DejaVuSans.ttf",
        bold: "DejaVuSans-Bold.ttf",
        italic: "DejaVuSans-Oblique.ttf",
        bold_italic: "DejaVuSans-BoldOblique.ttf",
    },
    SystemFamily {
        name: "Arial",
        regular: "arial.ttf",
        bold: "arialbd.ttf",
        italic: "ariali.ttf",
        bold_italic: "arialbi.ttf",
    },
];

const SYSTEM_MONOSPACE_FAMILIES: &[SystemFamily] = &[
    SystemFamily {
        name: "DejaVu Sans Mono",
        regular: "DejaVuSansMono.ttf",
        bold: "DejaVuSansMono-Bold.ttf",
        italic: "DejaVuSansMono-Oblique.ttf",
        bold_italic: "DejaVuSansMono-BoldOblique.ttf",
    },
    SystemFamily {
        name: "Consolas",
        regular: "consola.ttf",
        bold: "consolab.ttf",
        italic: "consolai.ttf",
        bold_italic: "consolaz.ttf",
    },
];

fn push_unique(candidates: &mut Vec<PathBuf>, candidate: PathBuf) {
    if !candidates.iter().any(|existing| existing == &candidate) {
        candidates.push(candidate);
    }
}

/// Directories searched for the bundled font files, in priority order.
pub fn font_directory_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = configured.filter(|path| !path.as_os_str().is_empty()) {
        candidates.push(path.to_path_buf());
    }

    if let Ok(current_exe) = env::current_exe() {
        if let Some(bin_dir) = current_exe.parent() {
            push_unique(&mut candidates, bin_dir.join("assets/fonts"));
        }
    }

    push_unique(
        &mut candidates,
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts"),
    );
    candidates
}

fn system_font_directories() -> Vec<PathBuf> {
    let mut directories = Vec::new();

    #[cfg(windows)]
    {
        for var in ["WINDIR", "SystemRoot"] {
            if let Some(root) = env::var_os(var).filter(|value| !value.is_empty()) {
                push_unique(&mut directories, PathBuf::from(root).join("Fonts"));
            }
        }
    }

    #[cfg(not(windows))]
    {
        for path in [
            "/usr/share/fonts/truetype/dejavu",
            "/usr/share/fonts/dejavu",
            "/usr/share/fonts/TTF",
            "/usr/local/share/fonts",
            "/Library/Fonts",
        ] {
            directories.push(PathBuf::from(path));
        }
    }

    directories
}

fn family_files(name: &str) -> impl Iterator<Item = String> + '_ {
    STYLE_SUFFIXES
        .iter()
        .map(move |suffix| format!("{name}-{suffix}.ttf"))
}

fn missing_font_files(path: &Path, family: &str) -> Vec<String> {
    family_files(family)
        .filter(|file| !path.join(file).is_file())
        .collect()
}

fn resolve_font_directory(configured: Option<&Path>, family: &str) -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates(configured) {
        let exists = candidate.is_dir();
        let missing = missing_font_files(&candidate, family);

        if exists && missing.is_empty() {
            return Ok(candidate);
        }

        let reason = if !exists {
            "directory missing".to_owned()
        } else {
            format!("missing files [{}]", missing.join(", "))
        };
        attempts.push(format!("{} ({})", candidate.display(), reason));
    }

    Err(Error::new(
        format!(
            "Unable to locate the {} font family. Checked: {}. Copy the fonts into assets/fonts or set fonts_dir.",
            family,
            attempts.join(", ")
        ),
        io::Error::new(io::ErrorKind::NotFound, "font directory not found"),
    ))
}

fn load_bundled_family(configured: Option<&Path>, family: &str) -> Result<FontFamily<FontData>, Error> {
    let directory = resolve_font_directory(configured, family)?;

    fonts::from_files(&directory, family, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                family,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

/// Finds the first system family whose four files share one directory.
fn find_system_family(families: &'static [SystemFamily]) -> Option<(&'static SystemFamily, PathBuf)> {
    let directories = system_font_directories();
    families.iter().find_map(|family| {
        directories
            .iter()
            .find(|directory| family.files().iter().all(|file| directory.join(file).is_file()))
            .map(|directory| (family, directory.clone()))
    })
}

fn load_system_font(directory: &Path, file: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        Error::new(
            format!("Failed to load system font at {}: {}", path.display(), err),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

fn load_system_family(families: &'static [SystemFamily]) -> Result<(&'static str, FontFamily<FontData>), Error> {
    let (family, directory) = find_system_family(families).ok_or_else(|| {
        Error::new(
            "No system font family found for fallback",
            io::Error::new(io::ErrorKind::NotFound, "system fonts not found"),
        )
    })?;

    let loaded = FontFamily {
        regular: load_system_font(&directory, family.regular)?,
        bold: load_system_font(&directory, family.bold)?,
        italic: load_system_font(&directory, family.italic)?,
        bold_italic: load_system_font(&directory, family.bold_italic)?,
    };
    Ok((family.name, loaded))
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the bundled Roboto family if available and otherwise falls back to a system family.
pub fn default_font_family(configured: Option<&Path>) -> Result<FontFamily<FontData>, Error> {
    match load_bundled_family(configured, DEFAULT_FONT_FAMILY_NAME) {
        Ok(family) => Ok(family),
        Err(err) if fonts_missing(&err) => match load_system_family(SYSTEM_FAMILIES) {
            Ok((name, fallback)) => {
                warn!("Bundled fonts unavailable ({err}); falling back to system '{name}' family.");
                Ok(fallback)
            }
            Err(fallback_err) => {
                warn!("Bundled fonts unavailable ({err}); system fallback failed: {fallback_err}");
                Err(Error::new(
                    format!("Bundled fonts unavailable and system fallback failed: {fallback_err}"),
                    io::Error::new(io::ErrorKind::NotFound, "default fonts are not available"),
                ))
            }
        },
        Err(err) => Err(err),
    }
}

/// Returns a monospace family for preformatted text, if one can be found.
pub fn monospace_font_family(configured: Option<&Path>) -> Option<FontFamily<FontData>> {
    match load_bundled_family(configured, MONOSPACE_FONT_FAMILY_NAME) {
        Ok(family) => Some(family),
        Err(bundled_err) => match load_system_family(SYSTEM_MONOSPACE_FAMILIES) {
            Ok((name, family)) => {
                debug!("Using system '{name}' for preformatted text");
                Some(family)
            }
            Err(err) => {
                debug!("No monospace font ({bundled_err}; {err}); preformatted text uses the body font");
                None
            }
        },
    }
}

/// Path of the regular face of the family [`default_font_family`] would load.
///
/// Figures rasterize their labels with this single file.
pub fn regular_font_file(configured: Option<&Path>) -> Option<PathBuf> {
    if let Ok(directory) = resolve_font_directory(configured, DEFAULT_FONT_FAMILY_NAME) {
        return Some(directory.join(format!("{DEFAULT_FONT_FAMILY_NAME}-Regular.ttf")));
    }
    find_system_family(SYSTEM_FAMILIES).map(|(family, directory)| directory.join(family.regular))
}

/// Indicates whether [`default_font_family`] can find a complete family without loading it.
pub fn default_fonts_available(configured: Option<&Path>) -> bool {
    resolve_font_directory(configured, DEFAULT_FONT_FAMILY_NAME).is_ok()
        || find_system_family(SYSTEM_FAMILIES).is_some()
}
