//! CLI configuration loading

use provscan_detectors::DetectorConfig;

/// Load the detector configuration and apply CLI overrides
///
/// An explicitly named file must exist; without one the built-in defaults
/// are used.
pub fn load(cli: &crate::Cli) -> anyhow::Result<DetectorConfig> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::from_file(path)?,
        None => DetectorConfig::default(),
    };

    // Apply CLI overrides
    if let Some(deadline_ms) = cli.deadline_ms {
        config.concurrent_deadline_ms = deadline_ms;
    }

    if cli.generic_terms {
        config.generic_terms = true;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_without_file() {
        let cli = crate::Cli::try_parse_from(["provscan", "a.png"]).unwrap();
        assert_eq!(load(&cli).unwrap(), DetectorConfig::default());
    }

    #[test]
    fn test_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provscan.yaml");
        std::fs::write(&path, "concurrent_deadline_ms: 1200\nfast_min_size: 4096\n").unwrap();

        let args: Vec<std::ffi::OsString> = vec![
            "provscan".into(),
            "--config".into(),
            path.into_os_string(),
            "--deadline-ms".into(),
            "800".into(),
            "--generic-terms".into(),
            "a.png".into(),
        ];
        let cli = crate::Cli::try_parse_from(args).unwrap();

        let config = load(&cli).unwrap();
        assert_eq!(config.concurrent_deadline_ms, 800);
        assert_eq!(config.fast_min_size, 4096);
        assert!(config.generic_terms);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let cli = crate::Cli::try_parse_from(["provscan", "--config", "/no/such/provscan.yaml", "a.png"]).unwrap();
        assert!(load(&cli).is_err());
    }

    #[test]
    fn test_zero_deadline_override_rejected() {
        let cli = crate::Cli::try_parse_from(["provscan", "--deadline-ms", "0", "a.png"]).unwrap();
        assert!(load(&cli).is_err());
    }
}
