use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_watch_command() {
	let args = vec!["pw-targets", "watch", "ws://127.0.0.1:9222/devtools/browser/abc"];
	let cli = Cli::try_parse_from(args).unwrap();

	match cli.command {
		Commands::Watch(args) => {
			assert_eq!(args.endpoint.endpoint, "ws://127.0.0.1:9222/devtools/browser/abc");
			assert!(args.endpoint.exclude_types.is_empty());
			assert!(args.endpoint.only_types.is_empty());
			assert_eq!(args.endpoint.timeout_ms, None);
			assert!(!args.attached_only);
		}
		_ => panic!("Expected Watch command"),
	}
	assert_eq!(cli.format, OutputFormat::Text);
	assert_eq!(cli.config, None);
}

#[test]
fn parse_list_with_filters() {
	let args = vec![
		"pw-targets",
		"list",
		"http://localhost:9222",
		"--exclude-type",
		"tab",
		"--exclude-type",
		"shared_worker",
		"--only-type",
		"page",
		"--timeout-ms",
		"2500",
		"--all",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	match cli.command {
		Commands::List(args) => {
			assert_eq!(args.endpoint.endpoint, "http://localhost:9222");
			assert_eq!(args.endpoint.exclude_types, vec!["tab", "shared_worker"]);
			assert_eq!(args.endpoint.only_types, vec!["page"]);
			assert_eq!(args.endpoint.timeout_ms, Some(2500));
			assert!(args.all);
		}
		_ => panic!("Expected List command"),
	}
}

#[test]
fn global_flags_after_subcommand() {
	let args = vec![
		"pw-targets",
		"watch",
		"ws://127.0.0.1:9222/devtools/browser/abc",
		"-f",
		"ndjson",
		"--config",
		"/tmp/targets.json",
		"--attached-only",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	assert_eq!(cli.format, OutputFormat::Ndjson);
	assert_eq!(cli.config, Some(PathBuf::from("/tmp/targets.json")));
	assert!(matches!(cli.command, Commands::Watch(ref args) if args.attached_only));
}

#[test]
fn verbose_flag_counts() {
	let cli = Cli::try_parse_from(vec!["pw-targets", "-vv", "list", "ws://x/devtools/browser/1"]).unwrap();
	assert_eq!(cli.verbose, 2);

	let cli = Cli::try_parse_from(vec!["pw-targets", "list", "ws://x/devtools/browser/1", "--verbose"]).unwrap();
	assert_eq!(cli.verbose, 1);
}

#[test]
fn endpoint_is_required() {
	assert!(Cli::try_parse_from(vec!["pw-targets", "watch"]).is_err());
}

#[test]
fn invalid_format_rejected() {
	let result = Cli::try_parse_from(vec!["pw-targets", "-f", "yaml", "list", "ws://x/devtools/browser/1"]);
	assert!(result.is_err());
}
