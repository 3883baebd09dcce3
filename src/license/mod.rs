//! License classification and registry resolution.
//!
//! - [`classifier`] — turns a registry `info` block into a normalized,
//!   filesystem-safe label, applying hard overrides last.
//! - [`resolver`] — fetches metadata for one package (honouring fixed query
//!   URLs and the fallback table) and builds its [`LicenseRecord`](crate::models::LicenseRecord).

pub mod classifier;
pub mod resolver;
