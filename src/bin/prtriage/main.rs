mod display;

use prtriage::{GitHub, apply_tasks, parse_args, plan_triage};
use display::{display_prs, output_shell_commands};
use tracing::info;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (spec, display_mode) = match parse_args(std::env::args()) {
        Ok(result) => result,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let github = GitHub::from_env()?;
    let result = plan_triage(&spec, &github).await?;
    let mut stdout = std::io::stdout();

    if !spec.has_jobs() {
        display_prs(&result.pull_requests, &display_mode, &mut stdout)?;
    } else if spec.apply {
        let report = apply_tasks(&result.tasks, &github, spec.concurrency).await;
        info!(applied = report.applied, failed = report.failed, "triage complete");
        if report.failed > 0 {
            anyhow::bail!("{} of {} changes failed", report.failed, result.tasks.len());
        }
    } else {
        output_shell_commands(&result.tasks, &mut stdout)?;
    }

    Ok(())
}
