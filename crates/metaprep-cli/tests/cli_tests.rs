//! Command-line tests: argument parsing, configuration overlay, exit codes.

use std::fs;

use clap::Parser;
use metaprep_cli::{execute, Cli, ColorChoice, EXIT_CONFIG, EXIT_FAILURE, EXIT_SUCCESS};
use metaprep_compiler::MetaprepError;
use tempfile::TempDir;

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("metaprep").chain(args.iter().copied()))
        .unwrap_or_else(|e| panic!("{e}"))
}

#[test]
fn test_parse_all_flags() {
    let cli = cli(&[
        "-o", "gen", "--dump", "d.mps", "--no-receipt", "--manifest", "m.json", "--color", "never",
        "-vv", "a.c", "b.mps",
    ]);
    assert_eq!(cli.sources.len(), 2);
    assert_eq!(cli.color, ColorChoice::Never);
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.log_filter(), "trace");

    let options = cli.options().unwrap();
    assert_eq!(options.output_dir, std::path::PathBuf::from("gen"));
    assert_eq!(options.dump_path, Some("d.mps".into()));
    assert!(!options.receipt);
    assert!(!options.color);
}

#[test]
fn test_unknown_color_rejected() {
    assert!(Cli::try_parse_from(["metaprep", "--color", "sometimes", "a.c"]).is_err());
}

#[test]
fn test_config_file_overlaid_by_flags() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("metaprep.json");
    fs::write(
        &config,
        r#"{ "sources": ["x.c"], "output_dir": "from-config", "receipt": false }"#,
    )
    .unwrap();
    let config = config.display().to_string();

    let options = cli(&["--config", &config, "--color", "always"]).options().unwrap();
    assert_eq!(options.sources, vec![std::path::PathBuf::from("x.c")]);
    assert_eq!(options.output_dir, std::path::PathBuf::from("from-config"));
    assert!(!options.receipt);
    assert!(options.color);

    let options = cli(&["--config", &config, "-o", "flag", "y.c"]).options().unwrap();
    assert_eq!(options.sources, vec![std::path::PathBuf::from("y.c")]);
    assert_eq!(options.output_dir, std::path::PathBuf::from("flag"));
}

#[test]
fn test_no_sources_is_config_error() {
    assert!(cli(&[]).options().is_err());
    assert_eq!(execute(&cli(&["--color", "never"])), EXIT_CONFIG);
}

#[test]
fn test_bad_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.json");
    fs::write(&config, "{ \"sources\": 3 }").unwrap();
    let err = cli(&["--config", &config.display().to_string()]).options().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MetaprepError>(),
        Some(MetaprepError::Config { .. })
    ));
    let code = execute(&cli(&["--config", &config.display().to_string(), "a.c"]));
    assert_eq!(code, EXIT_CONFIG);
}

#[test]
fn test_missing_config_is_config_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("absent.json").display().to_string();
    let err = cli(&["--config", &config, "a.c"]).options().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MetaprepError>(),
        Some(MetaprepError::Read { .. })
    ));
    assert_eq!(execute(&cli(&["--config", &config, "a.c"])), EXIT_CONFIG);
}

#[test]
fn test_successful_run_writes_output_and_manifest() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("main.c");
    fs::write(
        &source,
        "#include \"main.h\"\n/* #meta\n    Meta.line(\"int generated;\")\n*/\n",
    )
    .unwrap();
    let manifest = dir.path().join("manifest.json");
    let code = execute(&cli(&[
        "--no-receipt",
        "--color",
        "never",
        "-o",
        &dir.path().display().to_string(),
        "--manifest",
        &manifest.display().to_string(),
        &source.display().to_string(),
    ]));
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(dir.path().join("main.h")).unwrap(), "int generated;\n");
    let manifest = fs::read_to_string(manifest).unwrap();
    assert!(manifest.contains("\"sha256\""), "{manifest}");
}

#[test]
fn test_diagnostic_exit_code() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("main.c");
    fs::write(&source, "/* #meta import NOTHING */\n").unwrap();
    let code = execute(&cli(&["--color", "never", &source.display().to_string()]));
    assert_eq!(code, EXIT_FAILURE);
}
