//! Local Application Resolver.
//!
//! Maps keywords in free text to well-known executables and starts them
//! detached. A separate search fallback walks a fixed set of directories for
//! applications that are not in the table.

use anyhow::{Context, Result};
use hark_core::config::{AppsConfig, KnownAppEntry};
use hark_core::LaunchResult;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, OnceLock};

/// Directory levels below a search root that the fallback will enter.
pub const DEFAULT_SEARCH_DEPTH: usize = 6;

const BUILTIN_APPS: &[(&str, &str)] = &[
    ("notepad", "notepad"),
    ("calculator", "calc"),
    ("paint", "mspaint"),
    ("word", "winword"),
    ("chrome", "chrome"),
];

// ============================================================================
// KnownAppTable
// ============================================================================

/// Ordered keyword → executable table.
#[derive(Debug, Clone)]
pub struct KnownAppTable {
    entries: Vec<(String, String)>,
}

impl Default for KnownAppTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KnownAppTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_APPS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Built-ins followed by `extra`, in order. Keywords are stored lower-cased.
    pub fn with_extra(extra: &[KnownAppEntry]) -> Self {
        let mut table = Self::builtin();
        table.entries.extend(
            extra
                .iter()
                .map(|e| (e.keyword.to_lowercase(), e.executable.clone())),
        );
        table
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Executable for the longest keyword contained in `text`. Equal-length
    /// matches resolve to the earlier table entry.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        let text = text.to_lowercase();
        let mut best: Option<&(String, String)> = None;
        for entry in &self.entries {
            if !text.contains(entry.0.as_str()) {
                continue;
            }
            if best.map_or(true, |b| entry.0.len() > b.0.len()) {
                best = Some(entry);
            }
        }
        best.map(|(_, exe)| exe.as_str())
    }
}

// ============================================================================
// Launch primitive
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Bare executable name, resolved by the OS.
    Name(String),
    /// Full path found by the search fallback.
    Path(PathBuf),
}

/// Fire-and-forget process start.
pub trait AppLauncher: Send + Sync {
    fn launch(&self, target: &LaunchTarget) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct SystemLauncher;

impl AppLauncher for SystemLauncher {
    fn launch(&self, target: &LaunchTarget) -> Result<()> {
        let mut cmd = match target {
            // Start-Process resolves App Paths registrations that plain
            // CreateProcess does not (winword, chrome).
            LaunchTarget::Name(name) if cfg!(windows) => {
                let mut cmd = Command::new("powershell");
                cmd.arg("-NoProfile")
                    .arg("-Command")
                    .arg(format!("Start-Process {}", name));
                cmd
            }
            LaunchTarget::Name(name) => Command::new(name),
            LaunchTarget::Path(path) => Command::new(path),
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start {:?}", target))?;
        Ok(())
    }
}

// ============================================================================
// Search fallback
// ============================================================================

/// File name the search fallback looks for.
pub fn executable_file_name(app: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", app)
    } else {
        app.to_string()
    }
}

/// First file named `file_name` (case-insensitive) under `roots`, searched in
/// root order. Within a directory, its files are checked before any
/// subdirectory is entered. Symlinked directories are not followed, and
/// nothing deeper than `max_depth` levels below a root is read.
pub fn find_executable(roots: &[PathBuf], file_name: &str, max_depth: usize) -> Option<PathBuf> {
    roots.iter().find_map(|root| walk(root, file_name, max_depth))
}

fn walk(dir: &Path, file_name: &str, depth_left: usize) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::trace!("skipping {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            subdirs.push(entry.path());
        } else if entry
            .file_name()
            .to_string_lossy()
            .eq_ignore_ascii_case(file_name)
        {
            return Some(entry.path());
        }
    }
    if depth_left == 0 {
        return None;
    }
    subdirs.into_iter().find_map(|d| walk(&d, file_name, depth_left - 1))
}

/// Application name from phrases like "open the foo" or "launch foo.exe".
pub fn launch_phrase(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:please\s+)?(?:open|launch|start|run)\s+(?:up\s+)?(?:the\s+|an?\s+|my\s+)?([a-z0-9][a-z0-9_.+-]*)",
        )
        .expect("launch phrase regex is valid")
    });

    let lowered = text.trim().to_lowercase();
    let name = re.captures(&lowered)?.get(1)?.as_str();
    let name = name.trim_end_matches('.');
    let name = name.strip_suffix(".exe").unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

// ============================================================================
// AppResolver
// ============================================================================

pub struct AppResolver {
    table: KnownAppTable,
    launcher: Arc<dyn AppLauncher>,
    search_roots: Vec<PathBuf>,
    search_depth: usize,
}

impl AppResolver {
    pub fn new(table: KnownAppTable, launcher: Arc<dyn AppLauncher>, search_roots: Vec<PathBuf>) -> Self {
        Self {
            table,
            launcher,
            search_roots,
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }

    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    pub fn from_config(config: &AppsConfig, launcher: Arc<dyn AppLauncher>) -> Self {
        Self::new(
            KnownAppTable::with_extra(&config.known),
            launcher,
            config.search_roots.clone(),
        )
        .with_search_depth(config.search_depth)
    }

    pub fn table(&self) -> &KnownAppTable {
        &self.table
    }

    /// Executable mapped from a keyword in `text`, if any.
    pub fn resolve(&self, text: &str) -> Option<&str> {
        self.table.lookup(text)
    }

    /// Launch the table match for `text`. `None` means no keyword matched and
    /// the caller should decide what to do next; no search happens here.
    pub fn resolve_and_launch(&self, text: &str) -> Option<LaunchResult> {
        let exe = self.resolve(text)?.to_string();
        tracing::info!("Detected a local app command, launching '{}'", exe);
        let result = match self.launcher.launch(&LaunchTarget::Name(exe.clone())) {
            Ok(()) => LaunchResult::launched(exe, None),
            Err(e) => {
                tracing::warn!("Failed to launch {}: {:#}", exe, e);
                LaunchResult::failed(exe.clone(), format!("Failed to launch {}: {:#}", exe, e))
            }
        };
        Some(result)
    }

    /// Walk the search roots for `app` and launch the first hit.
    pub async fn search_and_launch(&self, app: &str) -> LaunchResult {
        let roots = self.search_roots.clone();
        let file_name = executable_file_name(app);
        let depth = self.search_depth;
        let found = tokio::task::spawn_blocking(move || find_executable(&roots, &file_name, depth))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("application search aborted: {}", e);
                None
            });

        let Some(path) = found else {
            tracing::info!("'{}' not found under {:?}", app, self.search_roots);
            return LaunchResult::not_found(app);
        };

        match self.launcher.launch(&LaunchTarget::Path(path.clone())) {
            Ok(()) => LaunchResult::launched(app, Some(path)),
            Err(e) => {
                let mut result =
                    LaunchResult::failed(app, format!("Failed to launch {}: {:#}", path.display(), e));
                // Found but would not start; keep the path so callers can tell.
                result.path = Some(path);
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLauncher {
        launched: Mutex<Vec<LaunchTarget>>,
        fail: bool,
    }

    impl AppLauncher for RecordingLauncher {
        fn launch(&self, target: &LaunchTarget) -> Result<()> {
            if self.fail {
                anyhow::bail!("no such file");
            }
            self.launched.lock().unwrap().push(target.clone());
            Ok(())
        }
    }

    fn resolver(launcher: Arc<RecordingLauncher>, roots: Vec<PathBuf>) -> AppResolver {
        AppResolver::new(KnownAppTable::builtin(), launcher, roots)
    }

    #[test]
    fn test_lookup_builtin_keywords() {
        let table = KnownAppTable::builtin();
        assert_eq!(table.lookup("Open Notepad please"), Some("notepad"));
        assert_eq!(table.lookup("start the calculator"), Some("calc"));
        assert_eq!(table.lookup("launch paint"), Some("mspaint"));
        assert_eq!(table.lookup("list files in temp"), None);
    }

    #[test]
    fn test_lookup_prefers_longest_keyword() {
        let table = KnownAppTable::with_extra(&[KnownAppEntry {
            keyword: "WordPad".into(),
            executable: "wordpad".into(),
        }]);
        // "word" comes first in the table but "wordpad" is the better match.
        assert_eq!(table.lookup("open wordpad"), Some("wordpad"));
        assert_eq!(table.lookup("open word"), Some("winword"));
    }

    #[test]
    fn test_resolve_and_launch_uses_name_only() {
        let launcher = Arc::new(RecordingLauncher::default());
        let r = resolver(launcher.clone(), vec![]);
        let result = r.resolve_and_launch("open notepad").unwrap();
        assert!(result.launched);
        assert_eq!(result.app.as_deref(), Some("notepad"));
        assert_eq!(result.path, None);
        assert_eq!(
            *launcher.launched.lock().unwrap(),
            vec![LaunchTarget::Name("notepad".into())]
        );
    }

    #[test]
    fn test_resolve_defers_without_keyword() {
        let launcher = Arc::new(RecordingLauncher::default());
        let r = resolver(launcher.clone(), vec![]);
        assert!(r.resolve_and_launch("how much disk space is free").is_none());
        assert!(launcher.launched.lock().unwrap().is_empty());
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let launcher = Arc::new(RecordingLauncher {
            fail: true,
            ..Default::default()
        });
        let r = resolver(launcher, vec![]);
        let result = r.resolve_and_launch("open chrome").unwrap();
        assert!(!result.launched);
        assert!(result.error.unwrap().contains("no such file"));
    }

    #[test]
    fn test_launch_phrase() {
        assert_eq!(launch_phrase("Open the Spotify."), Some("spotify".into()));
        assert_eq!(launch_phrase(" launch vlc.exe"), Some("vlc".into()));
        assert_eq!(launch_phrase("please start a putty"), Some("putty".into()));
        assert_eq!(launch_phrase("list files in temp"), None);
        assert_eq!(launch_phrase("reopen the file"), None);
    }

    #[test]
    fn test_find_executable_files_before_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let name = executable_file_name("tool");
        fs::write(nested.join(&name), b"").unwrap();
        fs::write(dir.path().join(name.to_uppercase()), b"").unwrap();

        let found = find_executable(&[dir.path().to_path_buf()], &name, DEFAULT_SEARCH_DEPTH).unwrap();
        assert_eq!(found, dir.path().join(name.to_uppercase()));
    }

    #[test]
    fn test_find_executable_respects_root_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let name = executable_file_name("tool");
        let deep = first.path().join("x").join("y");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join(&name), b"").unwrap();
        fs::write(second.path().join(&name), b"").unwrap();

        let roots = vec![
            PathBuf::from("/definitely/not/here"),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ];
        assert_eq!(
            find_executable(&roots, &name, DEFAULT_SEARCH_DEPTH),
            Some(deep.join(&name))
        );
    }

    #[test]
    fn test_find_executable_stops_at_depth() {
        let dir = tempfile::tempdir().unwrap();
        let name = executable_file_name("tool");
        let deep = dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join(&name), b"").unwrap();
        let roots = vec![dir.path().to_path_buf()];

        assert_eq!(find_executable(&roots, &name, 3), Some(deep.join(&name)));
        assert_eq!(find_executable(&roots, &name, 2), None);
        assert_eq!(find_executable(&roots, &name, 0), None);
    }

    #[tokio::test]
    async fn test_resolver_search_depth_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let name = executable_file_name("putty");
        let deep = dir.path().join("vendor").join("bin");
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join(&name), b"").unwrap();

        let config = AppsConfig {
            search_roots: vec![dir.path().to_path_buf()],
            known: vec![],
            search_depth: 1,
        };
        let launcher = Arc::new(RecordingLauncher::default());
        let shallow = AppResolver::from_config(&config, launcher.clone());
        assert!(shallow.search_and_launch("putty").await.path.is_none());

        let deeper = AppResolver::from_config(&AppsConfig { search_depth: 2, ..config }, launcher.clone());
        assert!(deeper.search_and_launch("putty").await.launched);
    }

    #[tokio::test]
    async fn test_search_and_launch() {
        let dir = tempfile::tempdir().unwrap();
        let name = executable_file_name("putty");
        fs::write(dir.path().join(&name), b"").unwrap();

        let launcher = Arc::new(RecordingLauncher::default());
        let r = resolver(launcher.clone(), vec![dir.path().to_path_buf()]);
        let result = r.search_and_launch("putty").await;
        assert!(result.launched);
        assert_eq!(result.path, Some(dir.path().join(&name)));

        let missing = r.search_and_launch("zork").await;
        assert!(!missing.launched);
        assert_eq!(
            missing.error.as_deref(),
            Some("Could not find application 'zork' in common paths.")
        );
    }
}
