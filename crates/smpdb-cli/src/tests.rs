use super::*;

#[test]
fn parses_ingest_command() {
    let cli = Cli::try_parse_from([
        "smpdb-cli",
        "ingest",
        "--platform",
        "twitter",
        "--file",
        "batch.json",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Ingest { platform, file } => {
            assert_eq!(platform, "twitter");
            assert_eq!(file, PathBuf::from("batch.json"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn ingest_requires_platform_and_file() {
    assert!(Cli::try_parse_from(["smpdb-cli", "ingest"]).is_err());
    assert!(Cli::try_parse_from(["smpdb-cli", "ingest", "--platform", "twitter"]).is_err());
}

#[test]
fn parses_process_defaults() {
    let cli = Cli::try_parse_from(["smpdb-cli", "process"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Process {
            capability: None,
            batch_size: None
        }
    ));
}

#[test]
fn parses_process_with_overrides() {
    let cli = Cli::try_parse_from([
        "smpdb-cli",
        "process",
        "--capability",
        "sentiment",
        "--batch-size",
        "25",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Process {
            capability,
            batch_size,
        } => {
            assert_eq!(capability.as_deref(), Some("sentiment"));
            assert_eq!(batch_size, Some(25));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn rejects_non_numeric_batch_size() {
    assert!(Cli::try_parse_from(["smpdb-cli", "process", "--batch-size", "lots"]).is_err());
}

#[test]
fn parses_status_command() {
    let cli = Cli::try_parse_from(["smpdb-cli", "status"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Status));
}

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["smpdb-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Db {
            command: DbCommands::Ping
        }
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["smpdb-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Commands::Db {
            command: DbCommands::Migrate
        }
    ));
}

#[test]
fn missing_command_is_an_error() {
    assert!(Cli::try_parse_from(["smpdb-cli"]).is_err());
}
