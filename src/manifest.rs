use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, warn};

use crate::models::PackageIdentity;

/// Load every pinned `name==version` declaration from `inputs`.
///
/// Each input is a manifest file or a directory; a directory contributes every
/// file whose name contains `requirements`. Duplicates across files collapse.
pub fn load_identities(inputs: &[PathBuf]) -> Result<BTreeSet<PackageIdentity>> {
    let mut identities = BTreeSet::new();

    for file in manifest_files(inputs)? {
        let parsed = parse_requirements(&file)?;
        debug!("{}: {} pinned packages", file.display(), parsed.len());
        identities.extend(parsed);
    }

    Ok(identities)
}

fn manifest_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to list {}", input.display()))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| {
                    p.is_file()
                        && p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.contains("requirements"))
                })
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    Ok(files)
}

/// Parse a requirements file. Only exact `name==version` pins are kept.
fn parse_requirements(path: &Path) -> Result<Vec<PackageIdentity>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let re = Regex::new(r"^([A-Za-z0-9_\-\.]+)\s*==\s*([^\s;#]+)")?;
    let mut identities = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        match re.captures(line) {
            Some(caps) => identities.push(PackageIdentity::new(&caps[1], &caps[2])),
            None => warn!("{}: skipping unpinned line '{}'", path.display(), line),
        }
    }

    Ok(identities)
}
