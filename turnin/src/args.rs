// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "turnin",
    version,
    about,
    long_about = None,
    after_help = "Configuration precedence: defaults < config file < command-line flags.\n\
Config path precedence: default location < TURNIN_CONFIG_PATH < --config.\n\
The password is read from TURNIN_PASSWORD when set, otherwise prompted for without echo.\n\
Paths in the config file are resolved relative to the config file directory."
)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, turnin uses TURNIN_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
    #[arg(
        long,
        global = true,
        help = "Never prompt. Unknown host keys are rejected and confirmations fail unless --yes is given."
    )]
    pub non_interactive: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Check files locally without connecting.
    Validate(ValidateArgs),
    /// Connect to the gateway and show which worker host would be used.
    Hosts(HostsArgs),
    /// Upload files and run turnin for an assignment.
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Files or directories to check.
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct HostsArgs {
    /// Login name on the gateway. Overrides `username` from the config file.
    #[arg(long, short)]
    pub user: Option<String>,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Assignment name as the course expects it, e.g. `exercise1@myy502`.
    pub assignment: String,
    /// Files or directories to submit.
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,
    /// Login name on the gateway. Overrides `username` from the config file.
    #[arg(long, short)]
    pub user: Option<String>,
    /// Run on this worker instead of the one picked from cluster status.
    #[arg(long, value_name = "HOST")]
    pub worker: Option<String>,
    /// Staging directory under the remote home. Overrides `remote_dir` from the config file.
    #[arg(long, value_name = "DIR")]
    pub remote_dir: Option<String>,
    /// Submit the accepted files without asking when some were rejected.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const HELP_TEMPLATE: &str = r#"████████╗██╗   ██╗██████╗ ███╗   ██╗██╗███╗   ██╗
╚══██╔══╝██║   ██║██╔══██╗████╗  ██║██║████╗  ██║
   ██║   ██║   ██║██████╔╝██╔██╗ ██║██║██╔██╗ ██║
   ██║   ██║   ██║██╔══██╗██║╚██╗██║██║██║╚██╗██║
   ██║   ╚██████╔╝██║  ██║██║ ╚████║██║██║ ╚████║
   ╚═╝    ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═══╝╚═╝╚═╝  ╚═══╝

{before-help}{about-with-newline}{usage-heading} {usage}
{after-help}

{all-args}
"#;

fn apply_help_template_recursively(cmd: &mut clap::Command) {
    let mut owned = std::mem::take(cmd);
    owned = owned.help_template(HELP_TEMPLATE);
    for sub in owned.get_subcommands_mut() {
        apply_help_template_recursively(sub);
    }
    *cmd = owned;
}

pub fn cli_command() -> clap::Command {
    let mut cmd = Cli::command();
    apply_help_template_recursively(&mut cmd);
    cmd
}

pub fn parse_cli() -> Cli {
    let matches = cli_command().get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let matches = cli_command().try_get_matches_from(args)?;
        Cli::from_arg_matches(&matches)
    }

    #[test]
    fn command_definition_is_consistent() {
        cli_command().debug_assert();
    }

    #[test]
    fn parses_submit_with_flags() {
        let cli = parse(&[
            "turnin",
            "submit",
            "exercise1@myy502",
            "main.c",
            "src",
            "--user",
            "cs01234",
            "--worker",
            "dl380ws07",
            "-y",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Cmd::Submit(args) = cli.cmd else {
            panic!("expected submit");
        };
        assert_eq!(args.assignment, "exercise1@myy502");
        assert_eq!(args.paths, vec![PathBuf::from("main.c"), PathBuf::from("src")]);
        assert_eq!(args.user.as_deref(), Some("cs01234"));
        assert_eq!(args.worker.as_deref(), Some("dl380ws07"));
        assert!(args.yes);
    }

    #[test]
    fn submit_requires_at_least_one_path() {
        assert!(parse(&["turnin", "submit", "exercise1@myy502"]).is_err());
        assert!(parse(&["turnin", "validate"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = parse(&["turnin", "hosts", "--non-interactive", "--config", "x.toml"]).unwrap();
        assert!(cli.non_interactive);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.cmd, Cmd::Hosts(HostsArgs { user: None })));
    }
}
