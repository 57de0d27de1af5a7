//! Pack loading: manifest parsing, directory validation, and checksums.
//!
//! A pack is a directory with a `pack.json` manifest declaring skills by
//! relative path. Skill paths are traversal-guarded; checksums are verified
//! against `CHECKSUMS.sha256` when present, and a whole-pack checksum is
//! computed over sorted relative paths plus contents so the result is
//! independent of traversal order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::skills::SkillDefinition;

/// Errors from pack loading and verification.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// No manifest was found.
    #[error("no pack.json found in {0}")]
    ManifestMissing(PathBuf),
    /// The manifest could not be read or parsed.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A skill entry in a pack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackSkillEntry {
    /// Skill name.
    pub name: String,
    /// Path relative to the pack root.
    pub path: String,
    /// Whether a load failure is an error (vs. a warning).
    #[serde(default)]
    pub required: bool,
    /// Description override.
    #[serde(default)]
    pub description: String,
}

/// A pack manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackManifest {
    /// Pack name.
    pub name: String,
    /// Semver version.
    pub version: String,
    /// What the pack provides.
    #[serde(default)]
    pub description: String,
    /// Declared skills.
    #[serde(default)]
    pub skills: Vec<PackSkillEntry>,
}

/// Parse and validate the `pack.json` in a pack directory.
pub fn load_pack_manifest(pack_dir: &Path) -> Result<PackManifest, PackError> {
    let manifest_path = pack_dir.join("pack.json");
    if !manifest_path.is_file() {
        return Err(PackError::ManifestMissing(pack_dir.to_path_buf()));
    }
    let raw = std::fs::read_to_string(&manifest_path)?;
    let manifest: PackManifest =
        serde_json::from_str(&raw).map_err(|e| PackError::InvalidManifest(e.to_string()))?;
    if manifest.name.is_empty() {
        return Err(PackError::InvalidManifest("pack has no name".to_string()));
    }
    Ok(manifest)
}

/// Whether `path`, resolved against `root`, stays inside `root`.
fn stays_inside(root: &Path, relative: &str) -> bool {
    let mut depth: i32 = 0;
    for component in Path::new(relative).components() {
        match component {
            std::path::Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            std::path::Component::Normal(_) => depth += 1,
            std::path::Component::CurDir => {}
            // Absolute paths escape by definition.
            std::path::Component::RootDir | std::path::Component::Prefix(_) => return false,
        }
    }
    let _ = root;
    true
}

/// Load all skill definitions declared in a manifest. Required skills that
/// fail produce errors; optional ones produce logged warnings.
pub fn load_pack_skills(
    pack_dir: &Path,
    manifest: &PackManifest,
) -> (Vec<SkillDefinition>, Vec<String>) {
    let mut loaded = Vec::new();
    let mut errors = Vec::new();

    for entry in &manifest.skills {
        if !stays_inside(pack_dir, &entry.path) {
            let message = format!(
                "path traversal blocked: skill '{}' path '{}' escapes pack directory",
                entry.name, entry.path
            );
            if entry.required {
                errors.push(message);
            } else {
                warn!(skill = %entry.name, "pack_skill_path_traversal");
            }
            continue;
        }

        let skill_path = pack_dir.join(&entry.path);
        match std::fs::read_to_string(&skill_path) {
            Ok(raw) => match serde_json::from_str::<SkillDefinition>(&raw) {
                Ok(mut skill) => {
                    if skill.description.is_empty() && !entry.description.is_empty() {
                        skill.description = entry.description.clone();
                    }
                    debug!(pack = %manifest.name, skill = %skill.name, "pack_skill_loaded");
                    loaded.push(skill);
                }
                Err(e) => {
                    let message =
                        format!("failed to parse skill '{}': {e}", entry.name);
                    if entry.required {
                        errors.push(message);
                    } else {
                        warn!(skill = %entry.name, error = %e, "pack_optional_skill_parse_failed");
                    }
                }
            },
            Err(e) => {
                let message = format!(
                    "failed to load skill '{}' from '{}': {e}",
                    entry.name, entry.path
                );
                if entry.required {
                    errors.push(message);
                } else {
                    warn!(skill = %entry.name, error = %e, "pack_optional_skill_load_failed");
                }
            }
        }
    }

    (loaded, errors)
}

/// Validate pack structure: manifest present and parseable, declared skill
/// paths existing and traversal-free. Returns validation errors (empty =
/// valid).
#[must_use]
pub fn validate_pack_directory(pack_dir: &Path) -> Vec<String> {
    if !pack_dir.is_dir() {
        return vec![format!("pack directory does not exist: {}", pack_dir.display())];
    }
    let manifest = match load_pack_manifest(pack_dir) {
        Ok(manifest) => manifest,
        Err(e) => return vec![e.to_string()],
    };

    let mut errors = Vec::new();
    for entry in &manifest.skills {
        if !stays_inside(pack_dir, &entry.path) {
            errors.push(format!(
                "path traversal: skill '{}' path '{}' escapes pack directory",
                entry.name, entry.path
            ));
            continue;
        }
        if !pack_dir.join(&entry.path).exists() {
            errors.push(format!(
                "skill path not found: '{}' for skill '{}'",
                entry.path, entry.name
            ));
        }
    }
    errors
}

/// Verify `CHECKSUMS.sha256` entries against the pack contents. When the
/// file is absent the pack passes trivially.
pub fn verify_checksums(pack_dir: &Path) -> Result<(bool, Vec<String>), PackError> {
    let checksums_path = pack_dir.join("CHECKSUMS.sha256");
    if !checksums_path.is_file() {
        return Ok((true, Vec::new()));
    }

    let content = std::fs::read_to_string(&checksums_path)?;
    let mut mismatches = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((expected, file_path)) = line.split_once(char::is_whitespace) else {
            mismatches.push(format!("malformed checksum line: {line}"));
            continue;
        };
        let expected = expected.strip_prefix("sha256:").unwrap_or(expected);
        let file_path = file_path.trim();

        if !stays_inside(pack_dir, file_path) {
            mismatches.push(format!("path traversal in checksum: {file_path}"));
            continue;
        }
        let target = pack_dir.join(file_path);
        if !target.is_file() {
            mismatches.push(format!("file not found: {file_path}"));
            continue;
        }

        let actual = hex_digest(&std::fs::read(&target)?);
        if actual != expected {
            mismatches.push(format!(
                "checksum mismatch for {file_path}: expected {}..., got {}...",
                &expected[..expected.len().min(16)],
                &actual[..16]
            ));
        }
    }

    Ok((mismatches.is_empty(), mismatches))
}

/// Compute the whole-pack checksum: SHA-256 over each file's relative path
/// and contents, in sorted path order, so the hash is independent of
/// traversal order. Dotfiles are skipped.
pub fn compute_pack_checksum(pack_dir: &Path) -> Result<String, PackError> {
    let mut files = Vec::new();
    collect_files(pack_dir, pack_dir, &mut files)?;
    files.sort();

    let mut hasher = Sha256::new();
    for relative in files {
        hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update(std::fs::read(pack_dir.join(&relative))?);
    }
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), PackError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if path.is_file() {
            files.push(
                path.strip_prefix(root)
                    .expect("path under root")
                    .to_path_buf(),
            );
        }
    }
    Ok(())
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A registry of loaded packs.
#[derive(Debug, Default)]
pub struct PackRegistry {
    packs: HashMap<String, PackManifest>,
}

impl PackRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest under its name.
    pub fn register(&mut self, manifest: PackManifest) {
        self.packs.insert(manifest.name.clone(), manifest);
    }

    /// Get a manifest by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackManifest> {
        self.packs.get(name)
    }

    /// All pack names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.packs.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pack(dir: &Path, manifest: &serde_json::Value) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("pack.json"),
            serde_json::to_string_pretty(manifest).unwrap(),
        )
        .unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cadre-pack-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn manifest_round_trip() {
        let dir = temp_dir("manifest");
        make_pack(
            &dir,
            &serde_json::json!({
                "name": "review-pack",
                "version": "1.0.0",
                "skills": [{"name": "lint", "path": "skills/lint.json", "required": true}],
            }),
        );
        let manifest = load_pack_manifest(&dir).unwrap();
        assert_eq!(manifest.name, "review-pack");
        assert_eq!(manifest.skills.len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_manifest_errors() {
        let dir = temp_dir("empty");
        assert!(matches!(
            load_pack_manifest(&dir),
            Err(PackError::ManifestMissing(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn traversal_paths_are_blocked() {
        assert!(stays_inside(Path::new("/p"), "skills/lint.json"));
        assert!(stays_inside(Path::new("/p"), "a/../b.json"));
        assert!(!stays_inside(Path::new("/p"), "../outside.json"));
        assert!(!stays_inside(Path::new("/p"), "a/../../outside.json"));
        assert!(!stays_inside(Path::new("/p"), "/absolute/path.json"));
    }

    #[test]
    fn required_skill_failures_are_errors_optional_are_not() {
        let dir = temp_dir("skills");
        make_pack(
            &dir,
            &serde_json::json!({
                "name": "p",
                "version": "1.0.0",
                "skills": [
                    {"name": "missing-required", "path": "nope.json", "required": true},
                    {"name": "missing-optional", "path": "also-nope.json", "required": false},
                ],
            }),
        );
        let manifest = load_pack_manifest(&dir).unwrap();
        let (loaded, errors) = load_pack_skills(&dir, &manifest);
        assert!(loaded.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("missing-required"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn checksum_is_independent_of_traversal_order() {
        let dir = temp_dir("checksum");
        std::fs::create_dir_all(dir.join("b")).unwrap();
        std::fs::write(dir.join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.join("b/c.txt"), "gamma").unwrap();

        let first = compute_pack_checksum(&dir).unwrap();
        let second = compute_pack_checksum(&dir).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("sha256:"));

        // Content changes change the hash.
        std::fs::write(dir.join("a.txt"), "alpha2").unwrap();
        assert_ne!(compute_pack_checksum(&dir).unwrap(), first);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn verify_checksums_detects_mismatches() {
        let dir = temp_dir("verify");
        std::fs::write(dir.join("file.txt"), "content").unwrap();
        let good = hex_digest(b"content");
        std::fs::write(
            dir.join("CHECKSUMS.sha256"),
            format!("# header\nsha256:{good} file.txt\n"),
        )
        .unwrap();
        let (ok, mismatches) = verify_checksums(&dir).unwrap();
        assert!(ok, "{mismatches:?}");

        std::fs::write(dir.join("file.txt"), "tampered").unwrap();
        let (ok, mismatches) = verify_checksums(&dir).unwrap();
        assert!(!ok);
        assert_eq!(mismatches.len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn absent_checksum_file_passes() {
        let dir = temp_dir("nochecksum");
        let (ok, mismatches) = verify_checksums(&dir).unwrap();
        assert!(ok);
        assert!(mismatches.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
