mod alerts;
mod config;
mod event;
mod gate;
mod guard;
mod notify;
mod pipeline;
mod platform;
mod pr;
mod precondition;
mod report;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use config::Config;
use event::EventContext;
use gate::{Demotion, Verdict};
use guard::{GuardOutcome, GuardPolicy};
use notify::NotifyOutcome;
use platform::{GitHubClient, Platform};
use pr::{ChangedFile, DiffSource};

/// Security Gate runs CI governance checks for pull requests. It reviews
/// code-scanning alerts behind a hard merge gate and requires a privileged
/// approval for changes to the gate's own workflow definitions.
#[derive(Parser, Debug)]
#[command(name = "security-gate", version, about)]
struct Cli {
    /// Config file (defaults to .security-gate.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository as owner/name (defaults to GITHUB_REPOSITORY)
    #[arg(long, global = true)]
    repo: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Gate the PR on triaged code-scanning alerts
    AlertsGate {
        #[command(flatten)]
        target: PrArgs,

        /// Branch the upstream analysis ran on (defaults to the event's head ref)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Require a privileged review when protected workflow files change
    Guard {
        #[command(flatten)]
        target: PrArgs,

        #[command(flatten)]
        diff: DiffArgs,
    },

    /// Notify a webhook when watched configuration files change
    Notify {
        #[command(flatten)]
        target: PrArgs,

        #[command(flatten)]
        diff: DiffArgs,
    },
}

#[derive(Args, Debug)]
struct PrArgs {
    /// Pull request number (defaults to the triggering event's PR)
    #[arg(long, conflicts_with = "pr_url")]
    pr: Option<u64>,

    /// Pull request URL, e.g. https://github.com/org/repo/pull/42
    #[arg(long)]
    pr_url: Option<String>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Base revision (defaults to origin/$GITHUB_BASE_REF)
    #[arg(long)]
    base: Option<String>,

    /// Head revision
    #[arg(long, default_value = "HEAD")]
    head: String,

    #[arg(long, value_enum, default_value_t = DiffSource::Git)]
    diff_source: DiffSource,
}

/// Repository and PR the command acts on.
struct Target {
    repository: Option<String>,
    pr: Option<u64>,
}

impl Target {
    fn resolve(
        args: &PrArgs,
        cli_repo: Option<&str>,
        config: &Config,
        event: &EventContext,
    ) -> Result<Self, Box<dyn Error>> {
        if let Some(url) = args.pr_url.as_deref() {
            let parsed = pr::parse_pr_url(url)?;
            return Ok(Target {
                repository: Some(parsed.repository()),
                pr: Some(parsed.pr_number),
            });
        }

        let repository = cli_repo
            .map(str::to_string)
            .or_else(|| config.github.repository.clone())
            .or_else(|| event.repository.clone());
        Ok(Target {
            repository,
            pr: args.pr.or(event.pr_number),
        })
    }

    fn pr(&self) -> Result<u64, Box<dyn Error>> {
        self.pr.ok_or_else(|| {
            "could not resolve the pull request number; pass --pr or --pr-url, \
             or run on a pull_request event"
                .into()
        })
    }

    fn client(&self, config: &Config) -> Result<GitHubClient, Box<dyn Error>> {
        let repository = self
            .repository
            .as_deref()
            .ok_or("repository unknown; pass --repo or set GITHUB_REPOSITORY")?;
        Ok(GitHubClient::new(config, repository)?)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "run aborted");
            print_verdict(false, &err.to_string());
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command; `Ok(false)` is a policy failure.
async fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    info!("loading configuration");
    let config = Config::load(cli.config.as_deref())?;
    let event = EventContext::from_env();
    debug!(?event, "resolved event context");

    match &cli.command {
        Command::AlertsGate { target, branch } => {
            let target = Target::resolve(target, cli.repo.as_deref(), &config, &event)?;
            let pr = target.pr()?;
            let branch = branch
                .clone()
                .or_else(|| event.branch())
                .ok_or("could not resolve the head branch; pass --branch")?;
            let client = target.client(&config)?;

            alerts_gate(&client, &config, pr, &branch)
                .instrument(info_span!("alerts_gate", pr, branch = %branch))
                .await
        }
        Command::Guard { target, diff } => {
            let target = Target::resolve(target, cli.repo.as_deref(), &config, &event)?;
            let pr = target.pr()?;
            let client = target.client(&config)?;

            workflow_guard(&client, &config, &target, pr, diff, &event)
                .instrument(info_span!("guard", pr))
                .await
        }
        Command::Notify { target, diff } => {
            let target = Target::resolve(target, cli.repo.as_deref(), &config, &event)?;
            config_notify(&config, &target, diff, &event)
                .instrument(info_span!("notify"))
                .await
        }
    }
}

async fn alerts_gate(
    platform: &dyn Platform,
    config: &Config,
    pr: u64,
    branch: &str,
) -> Result<bool, Box<dyn Error>> {
    let report = pipeline::run_alerts_gate(platform, config, pr, branch).await?;
    info!(counts = %report.counts, comment = ?report.comment, "alerts gate finished");

    if let Demotion::Failed(reason) = &report.enforcement.demotion {
        println!(
            "{} could not move PR #{pr} back to draft: {reason}",
            "WARN".yellow().bold()
        );
    }

    match report.enforcement.verdict {
        Verdict::Pass => {
            print_verdict(true, "no unresolved or improperly dismissed security alerts");
            Ok(true)
        }
        Verdict::Fail => {
            print_verdict(false, &report.decision.summary());
            Ok(false)
        }
    }
}

async fn workflow_guard(
    platform: &dyn Platform,
    config: &Config,
    target: &Target,
    pr: u64,
    diff: &DiffArgs,
    event: &EventContext,
) -> Result<bool, Box<dyn Error>> {
    let changed = changed_files(Some(platform), target, diff, event).await?;
    let organization = config
        .guard
        .organization
        .clone()
        .or_else(|| {
            target
                .repository
                .as_deref()
                .and_then(|r| r.split_once('/'))
                .map(|(owner, _)| owner.to_string())
        })
        .ok_or("guard.organization is not set and the repository owner is unknown")?;
    let policy = GuardPolicy::new(&config.guard.protected_dir, &organization, &config.guard.team);

    let outcome = guard::evaluate(platform, pr, &changed, &policy).await?;
    match &outcome {
        GuardOutcome::Unprotected => {
            print_verdict(true, &format!("no files under {} changed", policy.protected_dir));
        }
        GuardOutcome::Approved { reviewer, protected } => {
            print_verdict(
                true,
                &format!("{} changed, reviewed by {reviewer} ({})", protected.join(", "), policy.group()),
            );
        }
        GuardOutcome::Rejected { protected, reason } => {
            print_verdict(
                false,
                &format!(
                    "{} changed and requires a review from {}: {reason}",
                    protected.join(", "),
                    policy.group()
                ),
            );
        }
    }
    Ok(outcome.passed())
}

async fn config_notify(
    config: &Config,
    target: &Target,
    diff: &DiffArgs,
    event: &EventContext,
) -> Result<bool, Box<dyn Error>> {
    let changed = match diff.diff_source {
        DiffSource::Git => changed_files(None, target, diff, event).await?,
        DiffSource::Api => {
            let client = target.client(config)?;
            changed_files(Some(&client as &dyn Platform), target, diff, event).await?
        }
    };

    let http = reqwest::Client::new();
    let outcome = notify::notify_on_change(
        &http,
        config.notify.webhook_url.as_deref(),
        &config.notify.message,
        &config.notify.watched_paths,
        &changed,
    )
    .await?;

    match outcome {
        NotifyOutcome::NothingWatched => print_verdict(true, "no watched configuration changed"),
        NotifyOutcome::Sent { paths } => {
            print_verdict(true, &format!("notified about {}", paths.join(", ")))
        }
        NotifyOutcome::SendFailed { paths, reason } => println!(
            "{} notification for {} not delivered: {reason}",
            "WARN".yellow().bold(),
            paths.join(", ")
        ),
    }
    Ok(true)
}

async fn changed_files(
    platform: Option<&dyn Platform>,
    target: &Target,
    diff: &DiffArgs,
    event: &EventContext,
) -> Result<Vec<ChangedFile>, Box<dyn Error>> {
    let files = match (diff.diff_source, platform) {
        (DiffSource::Api, Some(platform)) => pr::changed_files_from_api(platform, target.pr()?).await?,
        (DiffSource::Api, None) => return Err("--diff-source api needs a GitHub client".into()),
        (DiffSource::Git, _) => {
            let base = diff
                .base
                .clone()
                .or_else(|| event.base_ref.as_ref().map(|b| format!("origin/{b}")))
                .ok_or("could not resolve the base revision; pass --base")?;
            pr::changed_files_from_git(&base, &diff.head).await?
        }
    };
    for file in &files {
        debug!(
            path = %file.path,
            old_path = ?file.old_path,
            status = %file.status,
            "changed file"
        );
    }
    info!(files = files.len(), "resolved changed files");
    Ok(files)
}

fn print_verdict(passed: bool, detail: &str) {
    if passed {
        println!("{} {}", "PASS".green().bold(), detail);
    } else {
        println!("{} {}", "FAIL".red().bold(), detail);
    }
}
