use crate::config::Overrides;
use crate::error::ResolveError;
use crate::models::{ClassificationSource, LicenseClassification, PackageIdentity};
use crate::registry::pypi::PackageInfo;

/// Byte cap for labels; group files append `.txt` and most filesystems stop at 255.
const MAX_LABEL_BYTES: usize = 200;

/// Classify a package from its registry `info` block.
///
/// The `license` field wins when non-empty; otherwise the first trove
/// classifier mentioning `License` is used. A hard override for the package
/// name replaces either result.
pub fn classify(
    identity: &PackageIdentity,
    info: &PackageInfo,
    overrides: &Overrides,
) -> Result<LicenseClassification, ResolveError> {
    let detected = detect(identity, info);

    if let Some(label) = overrides.license(&identity.name) {
        return Ok(LicenseClassification {
            raw_field: detected.ok().and_then(|c| c.raw_field),
            normalized_label: sanitize_label(label),
            source: ClassificationSource::Override,
        });
    }

    detected
}

fn detect(
    identity: &PackageIdentity,
    info: &PackageInfo,
) -> Result<LicenseClassification, ResolveError> {
    if let Some(raw) = info.license.as_deref().filter(|l| !l.trim().is_empty()) {
        return Ok(LicenseClassification {
            raw_field: Some(raw.to_string()),
            normalized_label: sanitize_label(raw),
            source: ClassificationSource::PrimaryField,
        });
    }

    let classifier = info
        .classifiers
        .iter()
        .flatten()
        .find(|c| c.contains("License"))
        .ok_or_else(|| ResolveError::ClassifierAbsent {
            package: identity.to_string(),
        })?;

    Ok(LicenseClassification {
        raw_field: Some(classifier.clone()),
        normalized_label: label_from_classifier(classifier),
        source: ClassificationSource::ClassifierFallback,
    })
}

/// `License :: OSI Approved :: MIT License` becomes `OSI-Approved-MIT-License`.
pub fn label_from_classifier(classifier: &str) -> String {
    let rest: Vec<&str> = classifier
        .split("::")
        .map(str::trim)
        .skip(1)
        .filter(|s| !s.is_empty())
        .collect();
    sanitize_label(&rest.join("-"))
}

/// Make a label usable as a file name component.
///
/// Uses the first non-empty line only (some packages put the whole license
/// text in the field). Whitespace and path-breaking characters collapse into
/// single hyphens.
pub fn sanitize_label(raw: &str) -> String {
    let first_line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    let mut label = String::with_capacity(first_line.len());
    for c in first_line.chars() {
        let bad = c.is_whitespace()
            || c.is_control()
            || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|');
        if bad {
            if !label.is_empty() && !label.ends_with('-') {
                label.push('-');
            }
        } else {
            label.push(c);
        }
    }

    let mut label: String = label.trim_matches(|c| c == '-' || c == '.').to_string();
    if label.len() > MAX_LABEL_BYTES {
        let mut end = MAX_LABEL_BYTES;
        while !label.is_char_boundary(end) {
            end -= 1;
        }
        label.truncate(end);
        label = label.trim_end_matches(|c| c == '-' || c == '.').to_string();
    }

    if label.is_empty() {
        "UNKNOWN".to_string()
    } else {
        label
    }
}
