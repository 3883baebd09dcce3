/// A pinned dependency as declared in a manifest (`name==version`).
///
/// Ordering is by name, then version, so a `BTreeSet` of identities iterates
/// in the order the report is written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    PrimaryField,
    ClassifierFallback,
    Override,
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationSource::PrimaryField => write!(f, "license field"),
            ClassificationSource::ClassifierFallback => write!(f, "classifier"),
            ClassificationSource::Override => write!(f, "override"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseClassification {
    /// The registry string the label was derived from, if any.
    pub raw_field: Option<String>,
    /// Filesystem-safe label used to group packages.
    pub normalized_label: String,
    pub source: ClassificationSource,
}

impl LicenseClassification {
    /// Label written to the index: the registry's own wording when it came
    /// from the license field, otherwise the normalized label.
    pub fn display_label(&self) -> String {
        match (&self.source, &self.raw_field) {
            (ClassificationSource::PrimaryField, Some(raw)) => raw
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or(&self.normalized_label)
                .to_string(),
            _ => self.normalized_label.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LicenseRecord {
    pub identity: PackageIdentity,
    pub classification: LicenseClassification,
    pub registry_url: String,
    pub text_location_url: Option<String>,
}

/// Which acquisition path produced a license text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPath {
    Direct,
    Archive,
}

impl std::fmt::Display for TextPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextPath::Direct => write!(f, "direct"),
            TextPath::Archive => write!(f, "archive"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LicenseText {
    pub source_url: String,
    pub text: String,
    pub path: TextPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ordering_by_name_then_version() {
        let mut ids = vec![
            PackageIdentity::new("requests", "2.25.1"),
            PackageIdentity::new("astroid", "2.4.2"),
            PackageIdentity::new("requests", "2.24.0"),
        ];
        ids.sort();
        assert_eq!(ids[0].name, "astroid");
        assert_eq!(ids[1].version, "2.24.0");
        assert_eq!(ids[2].version, "2.25.1");
    }

    #[test]
    fn test_display_label_uses_first_line_of_raw_field() {
        let c = LicenseClassification {
            raw_field: Some("\nApache 2.0\n\nLong text follows".to_string()),
            normalized_label: "Apache-2.0".to_string(),
            source: ClassificationSource::PrimaryField,
        };
        assert_eq!(c.display_label(), "Apache 2.0");
    }

    #[test]
    fn test_display_label_for_classifier_is_normalized() {
        let c = LicenseClassification {
            raw_field: Some("License :: OSI Approved :: MIT License".to_string()),
            normalized_label: "OSI-Approved-MIT-License".to_string(),
            source: ClassificationSource::ClassifierFallback,
        };
        assert_eq!(c.display_label(), "OSI-Approved-MIT-License");
    }
}
