use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Root configuration structure, deserialized from `.license-bundlr/config.toml`.
///
/// Sections left out of a config file keep their built-in defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry and hosting platform endpoints.
    pub registry: RegistrySettings,
    /// Curated corrections for packages with unreliable registry data.
    pub overrides: Overrides,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Metadata is fetched from `{base_url}/{name}/{version}/json`.
    pub base_url: String,
    /// Project URLs on this host take the direct (license API) path.
    pub hosting_host: String,
    /// Base URL of the hosting platform's REST API.
    pub hosting_api: String,
    pub user_agent: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings {
            base_url: "https://pypi.org/pypi".to_string(),
            hosting_host: "github.com".to_string(),
            hosting_api: "https://api.github.com".to_string(),
            user_agent: format!("license-bundlr/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// License and URL to record for a package whose metadata lookup always fails.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fallback {
    pub license: String,
    pub url: String,
}

/// Static, engineer-maintained override tables. All keyed by package name.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Overrides {
    /// Fixed metadata URL, for packages whose metadata is broken at some versions.
    pub query_urls: BTreeMap<String, String>,
    /// License label that always wins over registry data.
    pub licenses: BTreeMap<String, String>,
    /// Used only when the metadata lookup itself fails.
    pub fallbacks: BTreeMap<String, Fallback>,
    /// Canonical repository or license-text URL.
    pub text_urls: BTreeMap<String, String>,
    /// Name substring -> canonical repository URL.
    pub keyword_repositories: BTreeMap<String, String>,
    /// Folder name used inside the distributed archive.
    pub folder_names: BTreeMap<String, String>,
    /// License file name to search for instead of `LICENSE`.
    pub license_files: BTreeMap<String, String>,
}

impl Overrides {
    pub fn query_url(&self, name: &str) -> Option<&str> {
        lookup(&self.query_urls, name).map(String::as_str)
    }

    pub fn license(&self, name: &str) -> Option<&str> {
        lookup(&self.licenses, name).map(String::as_str)
    }

    pub fn fallback(&self, name: &str) -> Option<&Fallback> {
        lookup(&self.fallbacks, name)
    }

    pub fn text_url(&self, name: &str) -> Option<&str> {
        lookup(&self.text_urls, name).map(String::as_str)
    }

    /// First keyword (in table order) contained in the lowercased package name.
    pub fn keyword_repository(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.keyword_repositories
            .iter()
            .find(|(keyword, _)| lower.contains(&keyword.to_lowercase()))
            .map(|(_, url)| url.as_str())
    }

    pub fn folder_name<'a>(&'a self, name: &'a str) -> &'a str {
        lookup(&self.folder_names, name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    pub fn license_file(&self, name: &str) -> &str {
        lookup(&self.license_files, name)
            .map(String::as_str)
            .unwrap_or("LICENSE")
    }
}

/// Exact match first, then case-insensitive: registry names are case-insensitive.
fn lookup<'a, V>(table: &'a BTreeMap<String, V>, name: &str) -> Option<&'a V> {
    table.get(name).or_else(|| {
        table
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn table(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for Overrides {
    /// Built-in overrides for packages known to misreport or break lookups.
    fn default() -> Self {
        let mut fallbacks = BTreeMap::new();
        fallbacks.insert(
            "backports.csv".to_string(),
            Fallback {
                license: "PSF".to_string(),
                url: "https://pypi.org/project/backports.csv/".to_string(),
            },
        );

        Overrides {
            query_urls: table(&[
                ("torch", "https://pypi.org/pypi/torch/1.5.0/json"),
                ("torchvision", "https://pypi.org/pypi/torchvision/0.6.0/json"),
                ("PyQt5-sip", "https://pypi.org/pypi/PyQt5-sip/12.8.0/json"),
            ]),
            licenses: table(&[("tornado", "Apache2.0")]),
            fallbacks,
            text_urls: table(&[
                ("numpy", "https://github.com/numpy/numpy"),
                ("torch", "https://github.com/pytorch/pytorch"),
                ("torchvision", "https://github.com/pytorch/vision"),
            ]),
            keyword_repositories: table(&[(
                "azure",
                "https://github.com/Azure/azure-sdk-for-python",
            )]),
            folder_names: table(&[
                ("PyQt5-sip", "PyQt5_sip"),
                ("typing-extensions", "typing_extensions"),
                ("backports.csv", "backports_csv"),
            ]),
            license_files: table(&[("astroid", "COPYING")]),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            registry: RegistrySettings::default(),
            overrides: Overrides::default(),
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.license-bundlr/config.toml`
/// 3. `~/.config/license-bundlr/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".license-bundlr").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-bundlr")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_overrides() {
        let o = Overrides::default();
        assert_eq!(o.license("tornado"), Some("Apache2.0"));
        assert_eq!(o.license_file("astroid"), "COPYING");
        assert_eq!(o.license_file("requests"), "LICENSE");
        assert_eq!(o.fallback("backports.csv").unwrap().license, "PSF");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let o = Overrides::default();
        assert_eq!(
            o.query_url("pyqt5-sip"),
            Some("https://pypi.org/pypi/PyQt5-sip/12.8.0/json")
        );
        assert_eq!(o.folder_name("pyqt5-sip"), "PyQt5_sip");
        assert_eq!(o.folder_name("requests"), "requests");
    }

    #[test]
    fn test_keyword_repository() {
        let o = Overrides::default();
        assert_eq!(
            o.keyword_repository("azure-storage-blob"),
            Some("https://github.com/Azure/azure-sdk-for-python")
        );
        assert_eq!(o.keyword_repository("requests"), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [overrides.licenses]
            "left-pad" = "WTFPL"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.overrides.license("left-pad"), Some("WTFPL"));
        assert_eq!(cfg.overrides.license("tornado"), None);
        assert_eq!(cfg.overrides.license_file("astroid"), "COPYING");
        assert_eq!(cfg.registry.base_url, "https://pypi.org/pypi");
    }

    #[test]
    fn test_load_config_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".license-bundlr");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            r#"
            [registry]
            base_url = "http://localhost:8080/pypi"

            [overrides.fallbacks."backports.csv"]
            license = "PSF-2.0"
            url = "https://example.org/backports.csv"
            "#,
        )
        .unwrap();

        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.registry.base_url, "http://localhost:8080/pypi");
        assert_eq!(cfg.registry.hosting_host, "github.com");
        assert_eq!(cfg.overrides.fallback("backports.csv").unwrap().license, "PSF-2.0");
    }
}
