use anyhow::Context as _;
use clap::Parser;
use claims_engine::{ClaimOrchestrator, ProcessingConfig, RawClaim};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing from `LOG_FORMAT` (pretty or json) and `RUST_LOG`
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "claims_engine=info,claim_graph=info".into());

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

/// Process one insurance claim and print its report
#[derive(Debug, Parser)]
#[command(name = "process-claim", version)]
struct Args {
    /// Raw claim record as a JSON object
    claim_path: PathBuf,

    /// Also print the execution trace as JSON
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ProcessingConfig::from_env().context("invalid CLAIMS_* configuration")?;
    let text = std::fs::read_to_string(&args.claim_path)
        .with_context(|| format!("failed to read {}", args.claim_path.display()))?;
    let raw: RawClaim = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON object", args.claim_path.display()))?;

    let orchestrator = ClaimOrchestrator::from_config(&config)?;
    let outcome = orchestrator.process(raw).await;
    info!(
        claim_id = %outcome.claim_id,
        decision = %outcome.decision.outcome,
        "Done"
    );

    println!("{}", outcome.report);
    if args.trace {
        println!("{}", serde_json::to_string_pretty(&outcome.trace)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_claim_path_and_trace_flag() {
        let args = Args::try_parse_from(["process-claim", "claim.json", "--trace"]).unwrap();
        assert_eq!(args.claim_path, PathBuf::from("claim.json"));
        assert!(args.trace);

        let args = Args::try_parse_from(["process-claim", "claim.json"]).unwrap();
        assert!(!args.trace);
    }

    #[test]
    fn claim_path_is_required() {
        assert!(Args::try_parse_from(["process-claim"]).is_err());
        assert!(Args::try_parse_from(["process-claim", "a.json", "b.json"]).is_err());
    }
}
