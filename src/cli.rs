use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};

use crate::types::{DisplayMode, Jobs, MergeMethod, MergePolicy, Repo, TriageSpec};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

#[derive(Args, Debug, Clone, Default)]
struct JobArgs {
    /// Assign PRs to the reviewers (or author) currently responsible for them
    #[arg(long, help_heading = "Jobs")]
    pub assign: bool,

    /// Copy labels from the issues a PR closes onto the PR
    #[arg(long = "copy-labels", help_heading = "Jobs")]
    pub copy_labels: bool,

    /// Merge PRs that are clean and not drafts
    #[arg(long, help_heading = "Jobs")]
    pub merge: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum MergeMethodArg {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl From<MergeMethodArg> for MergeMethod {
    fn from(arg: MergeMethodArg) -> Self {
        match arg {
            MergeMethodArg::Merge => MergeMethod::Merge,
            MergeMethodArg::Squash => MergeMethod::Squash,
            MergeMethodArg::Rebase => MergeMethod::Rebase,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct MergeArgs {
    /// How to merge
    #[arg(
        long = "merge-method",
        value_enum,
        default_value_t = MergeMethodArg::Merge,
        help_heading = "Merging"
    )]
    pub method: MergeMethodArg,

    /// Only merge PRs carrying this label
    #[arg(
        long = "merge-label",
        value_name = "LABEL",
        requires = "merge",
        help_heading = "Merging"
    )]
    pub required_label: Option<String>,
}

#[derive(Parser, Default, Debug)]
#[command(
    name = "prtriage",
    about = "Triage GitHub PRs: assign whoever is holding them up, copy labels from linked issues, merge the clean ones"
)]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// GitHub repository in format 'owner/repo' (required unless every PR is given as a URL)
    #[arg(short = 'r', long, value_name = "OWNER/REPO", env = "GITHUB_REPOSITORY")]
    pub repo: Option<String>,

    /// PR-NUMBER|PR-URL ... (default: all open PRs)
    pub prs: Vec<String>,

    /// Exclude specific PRs from processing (can specify multiple or comma-separated)
    #[arg(
        short = 'E',
        long = "exclude",
        value_name = "PR-NUMBER|PR-URL",
        value_delimiter = ','
    )]
    pub exclude: Vec<String>,

    #[command(flatten)]
    pub jobs: JobArgs,

    #[command(flatten)]
    pub merge: MergeArgs,

    /// Perform the changes instead of printing equivalent gh commands
    #[arg(long)]
    pub apply: bool,

    /// Maximum number of PRs fetched or updated concurrently
    #[arg(long, default_value = "4", value_name = "NUM")]
    pub concurrency: usize,

    /// Show each PR's review history
    #[arg(short = 'd', long, conflicts_with = "quiet")]
    pub detailed: bool,

    /// Print PR numbers only
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Limit the number of PRs to process
    #[arg(short = 'L', long, default_value = "30", value_name = "NUM")]
    pub limit: usize,
}

impl CliArgs {
    fn has_jobs(&self) -> bool {
        self.jobs.assign || self.jobs.copy_labels || self.jobs.merge
    }

    pub fn validate(&self) -> Result<()> {
        if self.apply && !self.has_jobs() {
            anyhow::bail!("--apply needs at least one of: --assign, --copy-labels, --merge");
        }

        if self.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }

        let all_urls = self
            .prs
            .iter()
            .chain(&self.exclude)
            .all(|pr| pr.trim().starts_with("https://"));
        if self.repo.is_none() && (self.prs.is_empty() || !all_urls) {
            anyhow::bail!("--repo is required unless every PR is given as a URL");
        }

        Ok(())
    }
}

fn parse_repo(repo: &str) -> Result<Repo> {
    Repo::parse(repo).map_err(|e| anyhow::anyhow!("Invalid repository format '{}': {}", repo, e))
}

/// Resolves PR arguments to numbers, checking that URLs belong to `repo`.
fn parse_pr_args(repo: &Repo, prs: &[String]) -> Result<Vec<u64>> {
    let mut numbers = Vec::new();

    for pr in prs {
        let pr = pr.trim();
        if pr.is_empty() {
            continue;
        }
        if pr.starts_with("https://") {
            let (pr_repo, number) = Repo::parse_url(pr)?;
            let number = number.context("URL must contain '/pull/' in the path")?;
            if &pr_repo != repo {
                anyhow::bail!("PR URL {} is from {} but the target repository is {}", pr, pr_repo, repo);
            }
            numbers.push(number);
        } else {
            let number: u64 = pr
                .parse()
                .with_context(|| format!("Invalid PR number: '{}'", pr))?;
            numbers.push(number);
        }
    }

    Ok(numbers)
}

/// Picks the target repository: `--repo` if given, otherwise the
/// repository of the first PR URL.
fn determine_repo(cli: &CliArgs) -> Result<Repo> {
    if let Some(repo) = &cli.repo {
        return parse_repo(repo);
    }
    let first = cli
        .prs
        .first()
        .context("--repo is required unless every PR is given as a URL")?;
    let (repo, _) = Repo::parse_url(first.trim())?;
    Ok(repo)
}

fn determine_display_mode(cli: &CliArgs) -> DisplayMode {
    match (cli.quiet, cli.detailed) {
        (true, _) => DisplayMode::Quiet,
        (_, true) => DisplayMode::Detailed,
        _ => DisplayMode::Normal,
    }
}

fn create_triage_spec(cli: CliArgs) -> Result<TriageSpec> {
    cli.validate()?;

    let repo = determine_repo(&cli)?;
    let prs = parse_pr_args(&repo, &cli.prs)?;
    let exclude = parse_pr_args(&repo, &cli.exclude)?;

    Ok(TriageSpec {
        repo,
        prs,
        exclude,
        limit: cli.limit,
        jobs: Jobs {
            assign: cli.jobs.assign,
            copy_labels: cli.jobs.copy_labels,
            merge: cli.jobs.merge,
        },
        merge_policy: MergePolicy {
            method: cli.merge.method.into(),
            required_label: cli.merge.required_label.filter(|l| !l.trim().is_empty()),
        },
        apply: cli.apply,
        concurrency: cli.concurrency,
    })
}

/// Parses command-line arguments into a triage specification and display
/// mode.
pub fn parse_args<I, T>(args: I) -> Result<(TriageSpec, DisplayMode)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    let display_mode = determine_display_mode(&cli);
    let spec = create_triage_spec(cli)?;
    Ok((spec, display_mode))
}
