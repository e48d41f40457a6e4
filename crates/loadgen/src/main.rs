//! `queryjob-loadgen`: fire synthetic jobs at the ingress.

use anyhow::Result;
use clap::Parser;

use queryjob_loadgen::{DEFAULT_CONCURRENCY, DEFAULT_TEMPLATE, LoadGenerator};

#[derive(Debug, Parser)]
#[command(name = "queryjob-loadgen", about = "Submit synthetic query jobs concurrently")]
struct Cli {
    /// Submission URL of the ingress.
    #[arg(long, env = "LOADGEN_ENDPOINT", default_value = "http://127.0.0.1:8080/request")]
    endpoint: String,

    /// Number of jobs to submit.
    #[arg(long, short = 'n', default_value_t = 100)]
    requests: u64,

    /// Submissions in flight at once.
    #[arg(long, short = 'c', default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Message template; the first `{}` becomes the job number.
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    template: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    queryjob_observability::init();
    let cli = Cli::parse();

    let report = LoadGenerator::new(cli.endpoint)
        .with_concurrency(cli.concurrency)
        .with_template(cli.template)
        .run(cli.requests)
        .await;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "requests": cli.requests,
            "succeeded": report.succeeded,
            "failed": report.failed,
        }))?
    );

    if report.failed > 0 {
        anyhow::bail!("{} of {} submissions failed", report.failed, cli.requests);
    }
    Ok(())
}
