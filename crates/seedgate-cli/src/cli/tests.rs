use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_run_defaults() {
    let cli = parse(&["seedgate", "run"]);
    assert!(matches!(cli.command, CliCommand::Run));
    assert_eq!(cli.log_level, "info");
    assert_eq!(cli.log_file_level, "warn");
}

#[test]
fn cli_parse_check_with_config() {
    let cli = parse(&["seedgate", "check", "--config", "/etc/seedgate.toml"]);
    assert!(matches!(cli.command, CliCommand::Check));
    assert_eq!(cli.config, Some(PathBuf::from("/etc/seedgate.toml")));
}

#[test]
fn cli_parse_global_options_before_subcommand() {
    let cli = parse(&[
        "seedgate",
        "--log-level",
        "debug",
        "--log-file-level",
        "error",
        "run",
    ]);
    assert!(matches!(cli.command, CliCommand::Run));
    assert_eq!(cli.log_level, "debug");
    assert_eq!(cli.log_file_level, "error");
}

#[test]
fn cli_requires_subcommand() {
    assert!(Cli::try_parse_from(["seedgate"]).is_err());
    assert!(Cli::try_parse_from(["seedgate", "add", "x"]).is_err());
}
