use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Overrides;
use crate::error::ResolveError;
use crate::models::{LicenseText, PackageIdentity, TextPath};
use crate::registry::pypi::{PackageMetadata, ReleaseFile};
use crate::registry::HttpSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

/// A downloaded artifact and its extraction directory, owned by one package's
/// attempt. Both are removed when the value is dropped.
#[derive(Debug)]
pub struct TransientArchive {
    attempt_dir: PathBuf,
    pub local_path: PathBuf,
    pub extracted_directory: PathBuf,
}

impl TransientArchive {
    /// Claim `<scratch>/<name>-<version>` for this attempt.
    ///
    /// An existing directory means another attempt owns it (or a previous one
    /// leaked), which is reported as a conflict rather than reused.
    pub fn create(
        scratch: &Path,
        identity: &PackageIdentity,
        file_name: &str,
    ) -> Result<Self, ResolveError> {
        let attempt_dir = scratch.join(format!("{}-{}", identity.name, identity.version));
        match fs::create_dir(&attempt_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ResolveError::FilesystemConflict { path: attempt_dir });
            }
            Err(e) => return Err(ResolveError::io(&attempt_dir, e)),
        }

        let archive = TransientArchive {
            local_path: attempt_dir.join(file_name),
            extracted_directory: attempt_dir.join("extracted"),
            attempt_dir,
        };
        fs::create_dir(&archive.extracted_directory)
            .map_err(|e| ResolveError::io(&archive.extracted_directory, e))?;

        Ok(archive)
    }
}

impl Drop for TransientArchive {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.attempt_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.attempt_dir.display(), e);
            }
        }
    }
}

/// Ranked download candidates for a release: the second file (usually the
/// source distribution) first, then the first file.
pub fn release_candidates(files: &[ReleaseFile]) -> Vec<(&'static str, &str)> {
    let mut candidates = Vec::new();
    if let Some(second) = files.get(1) {
        candidates.push(("second release file", second.url.as_str()));
    }
    if let Some(first) = files.first() {
        candidates.push(("first release file", first.url.as_str()));
    }
    candidates
}

/// Local file name for a download URL. Wheels are renamed to `.zip`.
pub fn local_file_name(url: &str) -> Result<(String, ArchiveFormat), ResolveError> {
    let tail = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .unwrap_or_else(|| url.rsplit('/').next().unwrap_or(url).to_string());

    let file_name = match tail.strip_suffix(".whl") {
        Some(stem) => format!("{}.zip", stem),
        None => tail,
    };

    let format = if file_name.ends_with(".tar.gz") {
        ArchiveFormat::TarGz
    } else if file_name.ends_with(".zip") {
        ArchiveFormat::Zip
    } else {
        return Err(ResolveError::UnsupportedArchiveFormat { file: file_name });
    };

    Ok((file_name, format))
}

/// Download the package's artifact and read its license file.
pub async fn fetch(
    http: &dyn HttpSource,
    overrides: &Overrides,
    scratch: &Path,
    identity: &PackageIdentity,
    metadata: &PackageMetadata,
) -> Result<LicenseText, ResolveError> {
    let candidates = release_candidates(metadata.release_files(&identity.version));
    let mut last_err = None;

    for (rung, url) in candidates {
        match attempt(http, overrides, scratch, identity, url).await {
            Ok(text) => {
                info!("{}: license text from {} ({})", identity, rung, url);
                return Ok(text);
            }
            Err(e) => {
                debug!("{}: {} failed: {}", identity, rung, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        ResolveError::text_unavailable(identity.to_string(), "no release files for this version")
    }))
}

async fn attempt(
    http: &dyn HttpSource,
    overrides: &Overrides,
    scratch: &Path,
    identity: &PackageIdentity,
    url: &str,
) -> Result<LicenseText, ResolveError> {
    let (file_name, format) = local_file_name(url)?;
    let archive = TransientArchive::create(scratch, identity, &file_name)?;

    let bytes = http
        .get_bytes(url)
        .await
        .map_err(|e| ResolveError::text_unavailable(identity.to_string(), e))?;
    fs::write(&archive.local_path, bytes).map_err(|e| ResolveError::io(&archive.local_path, e))?;

    extract(format, &archive.local_path, &archive.extracted_directory)?;

    let folder = locate_folder(&archive.extracted_directory, identity, overrides)?;
    let license_path = find_license_file(&folder, overrides.license_file(&identity.name))?;
    let bytes = fs::read(&license_path).map_err(|e| ResolveError::io(&license_path, e))?;

    Ok(LicenseText {
        source_url: url.to_string(),
        text: String::from_utf8_lossy(&bytes).into_owned(),
        path: TextPath::Archive,
    })
}

fn extract(format: ArchiveFormat, archive_path: &Path, dest: &Path) -> Result<(), ResolveError> {
    match format {
        ArchiveFormat::TarGz => extract_tarball(archive_path, dest),
        ArchiveFormat::Zip => extract_zip(archive_path, dest),
    }
}

fn extract_tarball(archive_path: &Path, dest: &Path) -> Result<(), ResolveError> {
    let file = File::open(archive_path).map_err(|e| ResolveError::io(archive_path, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(dest).map_err(|e| ResolveError::io(dest, e))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), ResolveError> {
    let file = File::open(archive_path).map_err(|e| ResolveError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| ResolveError::io(archive_path, std::io::Error::other(e)))?;
    archive
        .extract(dest)
        .map_err(|e| ResolveError::io(dest, std::io::Error::other(e)))
}

/// Find the package folder inside an extracted artifact, trying
/// `{name}-{version}` (source distribution) then `{name}-{version}.dist-info`
/// (wheel). Names are compared case-insensitively.
fn locate_folder(
    extracted: &Path,
    identity: &PackageIdentity,
    overrides: &Overrides,
) -> Result<PathBuf, ResolveError> {
    let base = overrides.folder_name(&identity.name);
    let candidates = [
        ("source folder", format!("{}-{}", base, identity.version)),
        ("dist-info folder", format!("{}-{}.dist-info", base, identity.version)),
    ];

    let entries: Vec<PathBuf> = fs::read_dir(extracted)
        .map_err(|e| ResolveError::io(extracted, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .collect();

    for (rung, wanted) in &candidates {
        let found = entries.iter().find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(wanted))
        });
        if let Some(folder) = found {
            debug!("{}: using {} {}", identity, rung, wanted);
            return Ok(folder.clone());
        }
    }

    Err(ResolveError::text_unavailable(
        identity.to_string(),
        format!(
            "no {} or {} folder in artifact",
            candidates[0].1, candidates[1].1
        ),
    ))
}

/// First file (shallowest, then by name) whose name starts with `file_name`,
/// ignoring case, so `LICENSE` also matches `License.txt`.
fn find_license_file(folder: &Path, file_name: &str) -> Result<PathBuf, ResolveError> {
    let wanted = file_name.to_lowercase();

    WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .starts_with(&wanted)
        })
        .min_by_key(|entry| entry.depth())
        .map(|entry| entry.into_path())
        .ok_or_else(|| ResolveError::LicenseFileNotFound {
            folder: folder.to_path_buf(),
            file_name: file_name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeHttp;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, body) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (path, body) in entries {
            writer.start_file(*path, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn metadata(version: &str, urls: &[&str]) -> PackageMetadata {
        let files: Vec<serde_json::Value> =
            urls.iter().map(|u| serde_json::json!({ "url": u })).collect();
        serde_json::from_value(serde_json::json!({
            "info": {},
            "releases": { version: files },
        }))
        .unwrap()
    }

    fn scratch_is_empty(scratch: &Path) -> bool {
        fs::read_dir(scratch).unwrap().next().is_none()
    }

    #[test]
    fn test_release_candidates_prefer_second() {
        let files = vec![
            ReleaseFile { url: "a.whl".to_string() },
            ReleaseFile { url: "a.tar.gz".to_string() },
        ];
        let c = release_candidates(&files);
        assert_eq!(c[0].1, "a.tar.gz");
        assert_eq!(c[1].1, "a.whl");
        assert_eq!(release_candidates(&files[..1]).len(), 1);
    }

    #[test]
    fn test_local_file_name() {
        let (name, format) =
            local_file_name("https://files.host/p/six-1.15.0-py2.py3-none-any.whl").unwrap();
        assert_eq!(name, "six-1.15.0-py2.py3-none-any.zip");
        assert_eq!(format, ArchiveFormat::Zip);

        let (name, format) = local_file_name("https://files.host/p/six-1.15.0.tar.gz").unwrap();
        assert_eq!(name, "six-1.15.0.tar.gz");
        assert_eq!(format, ArchiveFormat::TarGz);

        let err = local_file_name("https://files.host/p/pkg-1.0.tar.bz2").unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedArchiveFormat { .. }));
    }

    #[test]
    fn test_existing_attempt_dir_is_conflict() {
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("six", "1.15.0");
        fs::create_dir(scratch.path().join("six-1.15.0")).unwrap();

        let err = TransientArchive::create(scratch.path(), &id, "six.tar.gz").unwrap_err();
        assert!(matches!(err, ResolveError::FilesystemConflict { .. }));
    }

    #[tokio::test]
    async fn test_sdist_license_extracted_and_cleaned_up() {
        let url = "https://files.host/six-1.15.0.tar.gz";
        let http = FakeHttp::new().with_bytes(
            url,
            tar_gz(&[
                ("six-1.15.0/setup.py", "setup()"),
                ("six-1.15.0/LICENSE", "Copyright (c) 2010-2020 Benjamin Peterson"),
            ]),
        );
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("six", "1.15.0");
        let meta = metadata("1.15.0", &["https://files.host/six.whl", url]);

        let text = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap();
        assert_eq!(text.source_url, url);
        assert!(text.text.contains("Benjamin Peterson"));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_license_file_override_selects_copying() {
        let url = "https://files.host/astroid-2.4.2.tar.gz";
        let http = FakeHttp::new().with_bytes(
            url,
            tar_gz(&[
                ("astroid-2.4.2/LICENSE.bak", "wrong file"),
                ("astroid-2.4.2/COPYING", "GNU LESSER GENERAL PUBLIC LICENSE"),
                ("astroid-2.4.2/COPYING.LESSER", "lesser"),
            ]),
        );
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("astroid", "2.4.2");
        let meta = metadata("2.4.2", &[url]);

        let text = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap();
        assert_eq!(text.text, "GNU LESSER GENERAL PUBLIC LICENSE");
    }

    #[tokio::test]
    async fn test_wheel_dist_info_with_folder_alias() {
        let url = "https://files.host/typing_extensions-3.7.4-py3-none-any.whl";
        let http = FakeHttp::new().with_bytes(
            url,
            zip_bytes(&[
                ("typing_extensions.py", "pass"),
                ("typing_extensions-3.7.4.dist-info/license.txt", "PSF LICENSE AGREEMENT"),
            ]),
        );
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("typing-extensions", "3.7.4");
        let meta = metadata("3.7.4", &[url]);

        let text = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap();
        assert_eq!(text.text, "PSF LICENSE AGREEMENT");
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_falls_back_to_first_release_file() {
        let good = "https://files.host/idna-2.10.tar.gz";
        let http = FakeHttp::new().with_bytes(
            good,
            tar_gz(&[("idna-2.10/LICENSE.rst", "BSD-3-Clause")]),
        );
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("idna", "2.10");
        let meta = metadata("2.10", &[good, "https://files.host/idna-2.10.exe"]);

        let text = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap();
        assert_eq!(text.text, "BSD-3-Clause");
    }

    #[tokio::test]
    async fn test_missing_license_file_still_cleans_up() {
        let url = "https://files.host/nolicense-0.1.tar.gz";
        let http = FakeHttp::new().with_bytes(
            url,
            tar_gz(&[("nolicense-0.1/README", "no license here")]),
        );
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("nolicense", "0.1");
        let meta = metadata("0.1", &[url]);

        let err = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::LicenseFileNotFound { .. }));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_download_failure_cleans_up() {
        let url = "https://files.host/gone-1.0.tar.gz";
        let http = FakeHttp::new().with_status(url, 404);
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("gone", "1.0");
        let meta = metadata("1.0", &[url]);

        let err = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::TextUnavailable { .. }));
        assert!(scratch_is_empty(scratch.path()));
    }

    #[tokio::test]
    async fn test_no_release_files() {
        let http = FakeHttp::new();
        let scratch = tempfile::tempdir().unwrap();
        let id = PackageIdentity::new("empty", "1.0");
        let meta = metadata("1.0", &[]);

        let err = fetch(&http, &Overrides::default(), scratch.path(), &id, &meta)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::TextUnavailable { .. }));
    }
}
