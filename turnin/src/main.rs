// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};

use turnin_core::adapters::known_hosts::KnownHostsFile;
use turnin_core::adapters::ssh::SshAdapter;
use turnin_core::app::ports::{HostKeyPromptPort, ProgressPort};
use turnin_core::app::services::host_keys::{HostKeyMode, build_verifier};
use turnin_core::app::services::validation::validate_paths;
use turnin_core::app::types::{Credentials, WorkerHost};
use turnin_core::{SubmitRequest, Submitter};

mod args;
mod config;
mod logging;
mod terminal;

use args::{Cmd, SubmitArgs, ValidateArgs};
use terminal::{Target, print_failed, print_ok};

const PASSWORD_ENV_VAR: &str = "TURNIN_PASSWORD";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            let _ = print_failed(Target::Stderr, &format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<ExitCode> {
    let cli = args::parse_cli();
    let (user, remote_dir) = match &cli.cmd {
        Cmd::Submit(args) => (args.user.clone(), args.remote_dir.clone()),
        Cmd::Hosts(args) => (args.user.clone(), None),
        Cmd::Validate(_) => (None, None),
    };
    let config::LoadResult { config, report } = config::load_with_report(
        cli.config.clone(),
        config::Overrides {
            username: user,
            remote_dir,
            host_key_mode: cli.non_interactive.then_some(HostKeyMode::RejectUnknown),
            verbose: cli.verbose.then_some(true),
        },
    )?;
    logging::init(config.verbose)?;
    report.log();

    let interactive = !cli.non_interactive && terminal::has_tty();
    match cli.cmd {
        Cmd::Validate(args) => validate(&args),
        Cmd::Hosts(_) => hosts(&config, interactive).await,
        Cmd::Submit(args) => submit(&config, args, interactive).await,
    }
}

fn validate(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    let report = validate_paths(&args.paths);
    for path in &report.accepted {
        print_ok(Target::Stdout, &path.display().to_string())?;
    }
    for reason in &report.reasons {
        print_failed(Target::Stdout, reason)?;
    }
    if report.accepted.is_empty() && report.rejected.is_empty() {
        println!("No files found");
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn submitter(config: &config::Config, interactive: bool) -> Submitter {
    let store = Arc::new(KnownHostsFile::new(&config.known_hosts_path));
    let prompt = interactive
        .then(|| Arc::new(terminal::TerminalHostKeyPrompt) as Arc<dyn HostKeyPromptPort>);
    let verifier = build_verifier(
        config.host_key_mode,
        store,
        config.pinned_keys.clone(),
        prompt,
    );
    let adapter = Arc::new(SshAdapter::new(verifier, config.ssh_options()));
    Submitter::new(adapter, config.submit_settings())
}

fn credentials(config: &config::Config, interactive: bool) -> anyhow::Result<Credentials> {
    let username = match &config.username {
        Some(user) => user.clone(),
        None if interactive => terminal::prompt_line("Username: ", "")?,
        None => bail!("no username given; pass --user or set `username` in the config file"),
    };
    let username = username.trim().to_string();
    if username.is_empty() {
        bail!("username must not be empty");
    }

    let secret = match std::env::var(PASSWORD_ENV_VAR) {
        Ok(secret) if !secret.is_empty() => secret,
        _ if interactive => terminal::prompt_secret(&format!(
            "Password for {username}@{}: ",
            config.gateway.host
        ))?,
        _ => bail!("no password available; set {PASSWORD_ENV_VAR} when running non-interactively"),
    };
    Ok(Credentials::new(username, secret))
}

async fn hosts(config: &config::Config, interactive: bool) -> anyhow::Result<ExitCode> {
    let credentials = credentials(config, interactive)?;
    let submitter = submitter(config, interactive);
    match submitter.connect(&credentials, &config.gateway).await {
        Ok(connection) => {
            println!("{}", connection.worker);
            connection.session.close().await;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::debug!(code = err.code(), "connect failed: {err}");
            print_failed(Target::Stderr, &err.user_message())?;
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn submit(
    config: &config::Config,
    args: SubmitArgs,
    interactive: bool,
) -> anyhow::Result<ExitCode> {
    let assignment = args.assignment.trim().to_string();
    if assignment.is_empty() {
        bail!("assignment name must not be empty");
    }

    let report = validate_paths(&args.paths);
    for reason in &report.reasons {
        print_failed(Target::Stderr, reason)?;
    }
    if report.accepted.is_empty() {
        print_failed(Target::Stdout, "No valid files to submit")?;
        return Ok(ExitCode::FAILURE);
    }
    if !report.is_clean() && !args.yes {
        if !interactive {
            bail!(
                "{} file(s) were rejected; pass --yes to submit the remaining {}",
                report.rejected.len(),
                report.accepted.len()
            );
        }
        let proceed = terminal::confirm_action(
            &format!("Submit the remaining {} file(s)? ", report.accepted.len()),
            "y/N",
        )?;
        if !proceed {
            println!("Submission canceled");
            return Ok(ExitCode::FAILURE);
        }
    }

    let credentials = credentials(config, interactive)?;
    let request = SubmitRequest {
        gateway: config.gateway.clone(),
        worker: args.worker.map(WorkerHost::new),
        credentials,
        assignment,
        files: report.accepted,
        remote_subdir: config.remote_dir.clone(),
    };

    let submitter = Arc::new(submitter(config, interactive));
    let progress = Arc::new(terminal::TerminalProgress::new());
    let outcome = submitter
        .spawn_submit(request, None, Some(progress.clone() as Arc<dyn ProgressPort>))
        .await
        .context("submission task failed")?;
    progress.finish();

    if outcome.success {
        print_ok(Target::Stdout, &outcome.message)?;
        Ok(ExitCode::SUCCESS)
    } else {
        print_failed(Target::Stdout, &outcome.message)?;
        if let Some(output) = outcome.technical_output.as_deref().map(str::trim)
            && !output.is_empty()
        {
            eprintln!("{output}");
        }
        Ok(ExitCode::FAILURE)
    }
}
