use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

static FORBIDDEN_TITLE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>"|?*]"#).unwrap());
static REPEATED_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// Find files with a specific extension in a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let wanted = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
            {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file.
    ///
    /// The content goes to a temporary file in the same directory which is
    /// then renamed over the target, so readers never see a partial file.
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to flush temporary file for {:?}", path))?;
        temp.persist(path)
            .map_err(|e| anyhow!("Failed to write to file {:?}: {}", path, e.error))?;

        Ok(())
    }

    /// Return `path` if it is free, otherwise the first free `stem (n).ext`
    pub fn unique_path<P: AsRef<Path>>(path: P) -> PathBuf {
        let path = path.as_ref();
        if !path.exists() {
            return path.to_path_buf();
        }

        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1;
        loop {
            let candidate = parent.join(format!("{} ({}){}", stem, counter, extension));
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Rename every file in `dir` whose name starts with `<prefix>.` so that
    /// the prefix becomes `new_stem`, keeping the rest of the name.
    ///
    /// Returns the (from, to) pairs; with `dry_run` nothing is touched.
    pub fn rename_by_prefix<P: AsRef<Path>>(
        dir: P,
        prefix: &str,
        new_stem: &str,
        dry_run: bool,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let dir = dir.as_ref();
        let marker = format!("{}.", prefix);
        let mut renames = Vec::new();

        let mut entries: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to list directory: {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        for from in entries {
            let Some(name) = from.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let Some(suffix) = name.strip_prefix(&marker) else {
                continue;
            };

            let to = Self::unique_path(dir.join(format!("{}.{}", new_stem, suffix)));
            if dry_run {
                info!("[dry-run] {} -> {}", name, to.display());
            } else {
                fs::rename(&from, &to)
                    .with_context(|| format!("Failed to rename {:?} to {:?}", from, to))?;
                debug!("Renamed {} -> {}", name, to.display());
            }
            renames.push((from, to));
        }

        Ok(renames)
    }

    /// Apply an `id -> display stem` mapping to files in several directories.
    /// Missing directories are skipped with a warning.
    pub fn rename_from_mapping<P: AsRef<Path>>(
        dirs: &[P],
        mapping: &BTreeMap<String, String>,
        dry_run: bool,
    ) -> Result<usize> {
        let mut renamed = 0;
        for dir in dirs {
            let dir = dir.as_ref();
            if !Self::dir_exists(dir) {
                warn!("Directory not found, skipping: {}", dir.display());
                continue;
            }
            for (id, stem) in mapping {
                renamed += Self::rename_by_prefix(dir, id, stem, dry_run)?.len();
            }
        }
        Ok(renamed)
    }
}

/// Make a media title safe for use as a file name.
///
/// Fullwidth colons become ASCII, path separators become ` - `, characters
/// rejected by common filesystems are dropped and whitespace is collapsed.
pub fn sanitize_title(title: &str) -> String {
    let title = title.replace('：', ":").replace(['/', '\\'], " - ");
    let title = FORBIDDEN_TITLE_CHARS.replace_all(&title, "");
    REPEATED_WHITESPACE.replace_all(&title, " ").trim().to_string()
}

/// `<index>. <sanitized title>`
pub fn indexed_stem(index: usize, title: &str) -> String {
    format!("{}. {}", index, sanitize_title(title))
}
