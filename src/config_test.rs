/// Tests for config module
#[cfg(test)]
mod tests {
    use crate::cli::GenerateArgs;
    use crate::config::{ReportConfig, load_config, parse_config};
    use crate::orchestrator::FailMarkerPolicy;
    use crate::sentinel::MarkerScope;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn generate_args() -> GenerateArgs {
        GenerateArgs {
            out_dir: PathBuf::from("/reports"),
            name: "Invoice42".to_string(),
            ext: "pdf".to_string(),
            template: "InvoiceTemplate".to_string(),
            datasets: vec![],
            params: vec![],
            qr: vec![],
            qr_size: 300,
            templates_dir: None,
            renderer: None,
            render_timeout: None,
            marker_scope: None,
            record_all_failures: false,
            lock_timeout: None,
        }
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse_config("").expect("empty config should parse");
        assert_eq!(config, ReportConfig::default());
        assert_eq!(config.marker_scope, MarkerScope::Job);
        assert_eq!(config.fail_marker_policy, FailMarkerPolicy::Contention);
        assert!(config.renderer.program.is_none());
    }

    #[test]
    fn test_full_file_parses() {
        let text = r#"
templates_dir = "/srv/templates"
template_extension = "rdl"
marker_scope = "directory"
fail_marker_policy = "all"
lock_timeout_secs = 5

[renderer]
program = "/usr/local/bin/render-report"
args = ["--quiet"]
timeout_secs = 60

[chart]
base_url = "http://charts.internal/chart"
timeout_secs = 3
max_bytes = 1024
"#;
        let config = parse_config(text).expect("config should parse");

        assert_eq!(config.templates_dir, PathBuf::from("/srv/templates"));
        assert_eq!(config.template_extension, "rdl");
        assert_eq!(config.marker_scope, MarkerScope::Directory);
        assert_eq!(config.fail_marker_policy, FailMarkerPolicy::All);
        assert_eq!(config.renderer.program, Some(PathBuf::from("/usr/local/bin/render-report")));
        assert_eq!(config.renderer.args, vec!["--quiet".to_string()]);
        assert_eq!(config.chart.max_bytes, 1024);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = parse_config("tempaltes_dir = \"x\"").unwrap_err();
        assert_eq!(err.kind(), "config_error");
    }

    #[test]
    fn test_bad_scope_is_config_error() {
        assert!(parse_config("marker_scope = \"global\"").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_config(Some(&temp_dir.path().join("missing.toml"))).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "template_extension = \"rpt\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.template_extension, "rpt");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = parse_config("[renderer]\nprogram = \"/from/file\"\n").unwrap();
        let mut args = generate_args();
        args.renderer = Some(PathBuf::from("/from/flag"));
        args.templates_dir = Some(PathBuf::from("/flag/templates"));
        args.marker_scope = Some(MarkerScope::Directory);
        args.record_all_failures = true;

        config.apply_generate_overrides(&args);

        assert_eq!(config.renderer.program, Some(PathBuf::from("/from/flag")));
        assert_eq!(config.templates_dir, PathBuf::from("/flag/templates"));
        assert_eq!(config.marker_scope, MarkerScope::Directory);
        assert_eq!(config.fail_marker_policy, FailMarkerPolicy::All);
    }

    #[test]
    fn test_pipeline_requires_renderer() {
        let err = ReportConfig::default().build_pipeline().err().expect("should fail without renderer");
        assert_eq!(err.kind(), "config_error");

        let mut config = ReportConfig::default();
        config.renderer.program = Some(PathBuf::from("/bin/true"));
        assert!(config.build_pipeline().is_ok());
    }
}
