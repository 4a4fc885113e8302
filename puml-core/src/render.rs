//! Render invocation boundary.
//!
//! Rendering is delegated entirely to an external PlantUML installation.
//! The two ways of invoking it (a plantuml.jar run through `java`, or a
//! `plantuml` command on the PATH) are modelled as an ordered list of
//! strategies tried in turn, not nested branching. No timeout is enforced
//! on the external process; it is trusted to terminate.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::error::{Result, ViewerError};

/// A decoded render: PNG bytes plus the original pixel dimensions.
/// Transient — consumed by the view layer and discarded.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One way of invoking the external renderer.
pub trait RenderStrategy: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Render `source` to PNG bytes.
    fn render(&self, source: &Path) -> Result<Vec<u8>>;
}

/// Well-known plantuml.jar install locations, in probe order. Entries with
/// a `*` are glob-expanded and the newest match wins.
const JAR_LOCATIONS: [&str; 7] = [
    "/usr/local/bin/plantuml.jar",
    "/usr/local/Cellar/plantuml/*/libexec/plantuml.jar",
    "/usr/local/Cellar/plantuml/*/plantuml.jar",
    "/opt/homebrew/Cellar/plantuml/*/libexec/plantuml.jar",
    "/opt/plantuml/plantuml.jar",
    "/usr/share/plantuml/plantuml.jar",
    "/Applications/plantuml.jar",
];

/// Home-relative plantuml.jar locations.
const HOME_JAR_LOCATIONS: [&str; 4] = [
    "plantuml.jar",
    "bin/plantuml.jar",
    ".plantuml/plantuml.jar",
    "Downloads/plantuml.jar",
];

/// Invokes `java -jar plantuml.jar`.
pub struct JarStrategy {
    jar: PathBuf,
}

impl JarStrategy {
    pub fn new(jar: PathBuf) -> Self {
        JarStrategy { jar }
    }
}

impl RenderStrategy for JarStrategy {
    fn describe(&self) -> String {
        format!("java -jar {}", self.jar.display())
    }

    fn render(&self, source: &Path) -> Result<Vec<u8>> {
        let out_dir = tempfile::tempdir()?;
        let mut cmd = Command::new("java");
        cmd.arg("-jar")
            .arg(&self.jar)
            .arg("-tpng")
            .arg("-o")
            .arg(out_dir.path())
            .arg(source);
        run_renderer(cmd, &self.describe(), source, out_dir.path())
    }
}

/// Invokes a renderer command found on the PATH.
pub struct CommandStrategy {
    program: PathBuf,
}

impl CommandStrategy {
    pub fn new(program: PathBuf) -> Self {
        CommandStrategy { program }
    }
}

impl RenderStrategy for CommandStrategy {
    fn describe(&self) -> String {
        self.program.display().to_string()
    }

    fn render(&self, source: &Path) -> Result<Vec<u8>> {
        let out_dir = tempfile::tempdir()?;
        let mut cmd = Command::new(&self.program);
        cmd.arg("-tpng").arg("-o").arg(out_dir.path()).arg(source);
        run_renderer(cmd, &self.describe(), source, out_dir.path())
    }
}

/// Run the configured command and collect the PNG it produced.
fn run_renderer(mut cmd: Command, desc: &str, source: &Path, out_dir: &Path) -> Result<Vec<u8>> {
    debug!("running renderer: {} {}", desc, source.display());
    let output = cmd.output()?;

    if !output.status.success() {
        return Err(ViewerError::RendererFailed {
            command: desc.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    // The renderer names its output after the source file; fall back to any
    // PNG in the scratch directory if that guess misses.
    let expected = out_dir.join(output_name(source));
    let png_path = if expected.is_file() {
        expected
    } else {
        find_any_png(out_dir).ok_or_else(|| ViewerError::OutputMissing {
            dir: out_dir.to_path_buf(),
        })?
    };

    Ok(std::fs::read(png_path)?)
}

fn output_name(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "diagram".into());
    let mut name = PathBuf::from(stem);
    name.set_extension("png");
    name
}

fn find_any_png(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "png") {
            return Some(path);
        }
    }
    None
}

/// Probe the well-known jar locations, expanding globs and preferring the
/// newest match within each pattern.
fn probe_jar() -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = JAR_LOCATIONS.iter().map(PathBuf::from).collect();
    if let Some(home) = dirs::home_dir() {
        candidates.extend(HOME_JAR_LOCATIONS.iter().map(|rel| home.join(rel)));
    }

    for candidate in candidates {
        let spelled = candidate.to_string_lossy();
        if spelled.contains('*') {
            if let Some(newest) = newest_glob_match(&spelled) {
                info!("found PlantUML jar at {}", newest.display());
                return Some(newest);
            }
        } else if candidate.is_file() {
            info!("found PlantUML jar at {}", candidate.display());
            return Some(candidate);
        }
    }
    None
}

fn newest_glob_match(pattern: &str) -> Option<PathBuf> {
    let mut newest: Option<(PathBuf, SystemTime)> = None;
    for entry in glob::glob(pattern).ok()?.flatten() {
        let mtime = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(_, t)| mtime > *t) {
            newest = Some((entry, mtime));
        }
    }
    newest.map(|(path, _)| path)
}

/// Look for an executable on the PATH.
fn find_on_path(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// The ordered set of renderer strategies available on this machine.
pub struct RendererSet {
    strategies: Vec<Box<dyn RenderStrategy>>,
    probed: usize,
}

impl RendererSet {
    /// Discover the renderers installed on this machine, jar first.
    pub fn discover() -> RendererSet {
        let probed = JAR_LOCATIONS.len() + HOME_JAR_LOCATIONS.len() + 1;
        let mut strategies: Vec<Box<dyn RenderStrategy>> = Vec::new();

        if let Some(jar) = probe_jar() {
            strategies.push(Box::new(JarStrategy::new(jar)));
        }
        if let Some(program) = find_on_path("plantuml") {
            info!("found plantuml command at {}", program.display());
            strategies.push(Box::new(CommandStrategy::new(program)));
        }

        if strategies.is_empty() {
            warn!("no PlantUML renderer found; rendering will fail until one is installed");
        }
        RendererSet { strategies, probed }
    }

    /// Build a set from explicit strategies. Test seam.
    pub fn with_strategies(strategies: Vec<Box<dyn RenderStrategy>>) -> RendererSet {
        let probed = strategies.len();
        RendererSet { strategies, probed }
    }

    /// Render `source`, trying each strategy in turn, and decode the pixel
    /// dimensions of the first PNG produced. The PNG is also exported next
    /// to the source file; an export failure is only a warning.
    pub fn render(&self, source: &Path) -> Result<RenderResult> {
        let mut last_err = ViewerError::RendererNotFound {
            probed: self.probed,
        };

        for strategy in &self.strategies {
            match strategy.render(source) {
                Ok(png) => {
                    let decoded = image::load_from_memory(&png)?;
                    let result = RenderResult {
                        width: decoded.width(),
                        height: decoded.height(),
                        png,
                    };
                    export_beside_source(source, &result.png);
                    return Ok(result);
                }
                Err(e) => {
                    warn!("renderer {} failed: {}", strategy.describe(), e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Write the rendered PNG next to the source file, replacing the extension.
fn export_beside_source(source: &Path, png: &[u8]) {
    let export_path = source.with_extension("png");
    match std::fs::write(&export_path, png) {
        Ok(()) => debug!("exported PNG to {}", export_path.display()),
        Err(e) => warn!("could not export PNG to {}: {}", export_path.display(), e),
    }
}
