//! Build-time metadata embedded by the build script.
//!
//! Backs the `berth -v` banner and the daemon's `/version` endpoint.

/// The git commit the binary was built from (short form).
pub const GIT_HASH: &str = env!("BERTH_GIT_HASH");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("BERTH_BUILD_PROFILE");

/// The crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether this binary was built with the `experimental` feature.
pub fn experimental_build() -> bool {
    cfg!(feature = "experimental")
}

/// The one-line banner printed by `berth -v`.
///
/// Example: `"Berth version 0.1.0, build abc1234"`
pub fn version_banner() -> String {
    let mut banner = format!("Berth version {VERSION}, build {GIT_HASH}");
    if experimental_build() {
        banner.push_str(", experimental");
    }
    banner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_banner_contains_identifiers() {
        let banner = version_banner();
        assert!(banner.starts_with("Berth version "));
        assert!(banner.contains(VERSION));
        assert!(banner.contains(GIT_HASH));
    }

    #[test]
    fn test_experimental_marker_matches_feature() {
        assert_eq!(
            version_banner().ends_with(", experimental"),
            experimental_build()
        );
    }

    #[test]
    fn test_git_hash_not_empty() {
        assert!(!GIT_HASH.is_empty());
    }
}
