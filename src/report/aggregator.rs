use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::error::ResolveError;
use crate::license::resolver::Resolver;
use crate::models::{LicenseRecord, LicenseText, PackageIdentity, TextPath};
use crate::text::TextAcquirer;

/// File layout of one run's output under the output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    /// `name,license,url` rows, one per resolved package.
    pub index: PathBuf,
    /// One `<label>.txt` file per license label.
    pub groups_dir: PathBuf,
    /// Concatenated license texts.
    pub bundle: PathBuf,
    /// Download and extraction area, removed at the end of the run.
    pub scratch: PathBuf,
}

impl OutputLayout {
    pub fn new(root: &Path) -> Self {
        OutputLayout {
            root: root.to_path_buf(),
            index: root.join("Index.csv"),
            groups_dir: root.join("types"),
            bundle: root.join("LicenseTexts.txt"),
            scratch: root.join(".scratch"),
        }
    }

    /// Start a fresh report: truncate the index and bundle, recreate the group
    /// and scratch directories. Any failure here aborts the run.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Cannot create output root {}", self.root.display()))?;

        for file in [&self.index, &self.bundle] {
            File::create(file).with_context(|| format!("Cannot write {}", file.display()))?;
        }

        for dir in [&self.groups_dir, &self.scratch] {
            if dir.exists() {
                fs::remove_dir_all(dir)
                    .with_context(|| format!("Cannot clear {}", dir.display()))?;
            }
            fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        Ok(())
    }
}

/// Stage at which a package was given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    Text,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Metadata => write!(f, "metadata"),
            Stage::Text => write!(f, "license text"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SkippedPackage {
    pub identity: PackageIdentity,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PackageOutcome {
    pub record: LicenseRecord,
    pub text: Option<TextPath>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub attempted: usize,
    pub resolved: Vec<PackageOutcome>,
    pub groups: BTreeMap<String, Vec<String>>,
    pub skipped: Vec<SkippedPackage>,
    /// Labels whose group file could not be written, with the reason.
    pub group_failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn texts(&self) -> usize {
        self.resolved.iter().filter(|o| o.text.is_some()).count()
    }
}

/// Drives the run: resolve, record, fetch text, one package at a time.
pub struct Aggregator<'a> {
    resolver: Resolver<'a>,
    acquirer: TextAcquirer<'a>,
    layout: &'a OutputLayout,
}

impl<'a> Aggregator<'a> {
    pub fn new(resolver: Resolver<'a>, acquirer: TextAcquirer<'a>, layout: &'a OutputLayout) -> Self {
        Self {
            resolver,
            acquirer,
            layout,
        }
    }

    /// Process `identities` in order. Per-package failures are logged and
    /// collected; only output I/O errors end the run early. The scratch
    /// directory is removed either way.
    pub async fn run(
        &self,
        identities: &BTreeSet<PackageIdentity>,
        progress: Option<&ProgressBar>,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let processed = self.process(identities, progress, &mut summary).await;

        if let Err(e) = fs::remove_dir_all(&self.layout.scratch) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.layout.scratch.display(), e);
            }
        }
        processed?;

        summary.group_failures = self.write_groups(&summary.groups);
        Ok(summary)
    }

    async fn process(
        &self,
        identities: &BTreeSet<PackageIdentity>,
        progress: Option<&ProgressBar>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut index = open_append(&self.layout.index)?;
        let mut bundle = open_append(&self.layout.bundle)?;

        for identity in identities {
            summary.attempted += 1;
            if let Some(pb) = progress {
                pb.set_message(identity.name.clone());
            }

            let resolution = match self.resolver.resolve(identity).await {
                Ok(resolution) => resolution,
                Err(e) => {
                    skip(summary, identity, Stage::Metadata, &e);
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    continue;
                }
            };

            let record = resolution.record;
            write_index_row(&mut index, &record)
                .with_context(|| format!("Cannot append to {}", self.layout.index.display()))?;
            summary
                .groups
                .entry(record.classification.normalized_label.clone())
                .or_default()
                .push(identity.name.clone());

            let text_path = match self
                .acquirer
                .acquire(&record, resolution.metadata.as_ref())
                .await
            {
                Ok(text) => {
                    write_bundle_section(&mut bundle, identity, &text).with_context(|| {
                        format!("Cannot append to {}", self.layout.bundle.display())
                    })?;
                    Some(text.path)
                }
                Err(e) => {
                    skip(summary, identity, Stage::Text, &e);
                    None
                }
            };

            summary.resolved.push(PackageOutcome {
                record,
                text: text_path,
            });
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        Ok(())
    }

    /// Write one file per label. A label that cannot be written is logged and
    /// returned; the remaining labels are still written.
    fn write_groups(&self, groups: &BTreeMap<String, Vec<String>>) -> Vec<(String, String)> {
        let mut failures = Vec::new();

        for (label, names) in groups {
            let path = self.layout.groups_dir.join(format!("{}.txt", label));
            let mut content = names.join("\n");
            content.push('\n');
            if let Err(e) = fs::write(&path, content) {
                warn!("Cannot write license group {}: {}", path.display(), e);
                failures.push((label.clone(), e.to_string()));
            }
        }

        info!(
            "Wrote {} of {} license groups",
            groups.len() - failures.len(),
            groups.len()
        );
        failures
    }
}

fn skip(summary: &mut RunSummary, identity: &PackageIdentity, stage: Stage, err: &ResolveError) {
    warn!("Failed to get {} for {}: {}", stage, identity, err);
    summary.skipped.push(SkippedPackage {
        identity: identity.clone(),
        stage,
        reason: err.to_string(),
    });
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open {}", path.display()))
}

/// Rows go straight to disk so an interrupted run leaves a valid partial index.
fn write_index_row(out: &mut impl Write, record: &LicenseRecord) -> std::io::Result<()> {
    writeln!(
        out,
        "{},{},{}",
        csv_field(&record.identity.name),
        csv_field(&record.classification.display_label()),
        csv_field(&record.registry_url)
    )?;
    out.flush()
}

fn write_bundle_section(
    out: &mut impl Write,
    identity: &PackageIdentity,
    text: &LicenseText,
) -> std::io::Result<()> {
    write!(
        out,
        "--------License For {}-{}--------\n{}\n\n{}\n\n",
        identity.name,
        identity.version,
        text.source_url,
        text.text.trim_end()
    )?;
    out.flush()
}

/// Quote a CSV field when it holds a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
