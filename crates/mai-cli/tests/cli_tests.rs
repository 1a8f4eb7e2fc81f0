#[cfg(test)]
mod tests {
    use clap::Parser;
    use mai_cli::Cli;

    // ── Argument parsing ───────────────────────────────────────

    #[test]
    fn test_parses_every_subcommand() {
        for args in [
            vec!["mai", "start"],
            vec!["mai", "start", "--status-interval", "5"],
            vec!["mai", "streams", "--json"],
            vec!["mai", "config"],
            vec!["mai", "version"],
        ] {
            assert!(Cli::try_parse_from(args.iter().copied()).is_ok(), "failed to parse {args:?}");
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mai", "streams", "--config", "/tmp/mai.toml", "-v"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["mai", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["mai"]).is_err());
    }
}
