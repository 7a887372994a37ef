use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kready_await::{await_service_init, read_service_init, AwaitConfig, AwaitError, TracingSink};
use kready_core::{EventSummary, ResourceId};
use kready_kubehub::{KubeSource, ResourceSource};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kreadyctl", version, about = "Wait for or check Kubernetes Service readiness")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: current context)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the Service and its Endpoints until ready (Ctrl-C cancels)
    Await {
        /// Service name
        name: String,
    },
    /// One-shot readiness check against the current cluster state
    Read {
        /// Service name
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct Verdict {
    namespace: String,
    name: String,
    ready: bool,
    outcome: &'static str,
    reasons: Vec<String>,
    warnings: Vec<EventSummary>,
}

impl Verdict {
    fn from_result(id: &ResourceId, res: &Result<(), AwaitError>) -> Self {
        let (ready, outcome, reasons, warnings) = match res {
            Ok(()) => (true, "ready", Vec::new(), Vec::new()),
            Err(e) => (
                false,
                e.outcome(),
                e.reasons().to_vec(),
                e.unready().map(|u| u.warnings.clone()).unwrap_or_default(),
            ),
        };
        Self { namespace: id.namespace.clone(), name: id.name.clone(), ready, outcome, reasons, warnings }
    }

    fn exit_code(&self) -> i32 {
        match self.outcome {
            "ready" => 0,
            "not_found" => 2,
            _ => 1,
        }
    }
}

fn init_tracing() {
    let env = std::env::var("KREADY_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KREADY_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid KREADY_METRICS_ADDR; expected host:port");
        }
    }
}

fn report(output: Output, id: &ResourceId, res: &Result<(), AwaitError>) -> Result<i32> {
    let verdict = Verdict::from_result(id, res);
    match output {
        Output::Human => match res {
            Ok(()) => println!("service {} ready", id),
            Err(e) if e.is_not_found() => eprintln!("service {} not found", id),
            Err(e) => eprintln!("{}", e),
        },
        Output::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
    }
    Ok(verdict.exit_code())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let source = Arc::new(KubeSource::try_default().await?);
    let namespace = cli.namespace.clone().unwrap_or_else(|| source.client().default_namespace().to_string());

    let (name, live) = match &cli.command {
        Commands::Await { name } => (name.clone(), true),
        Commands::Read { name } => (name.clone(), false),
    };
    let id = ResourceId::new(namespace, name);

    // The live object stands in for the declared inputs: it decides whether an address is required.
    let inputs = match source.get_service(&id.namespace, &id.name).await {
        Ok(svc) => svc,
        Err(e) => {
            let res: Result<(), AwaitError> = Err(AwaitError::Fetch(e));
            let code = report(cli.output, &id, &res)?;
            std::process::exit(code);
        }
    };

    let cancel = CancellationToken::new();
    let config = AwaitConfig::new(id.clone(), inputs, source.clone())
        .with_diagnostics(Arc::new(TracingSink))
        .with_warnings(source.clone())
        .with_cancel(cancel.clone());

    let res = if live {
        info!(svc = %id, "await invoked");
        let ctrl_c = tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received; cancelling await");
                cancel.cancel();
            }
            if signal::ctrl_c().await.is_ok() {
                warn!("second Ctrl-C; exiting");
                std::process::exit(130);
            }
        });
        let res = await_service_init(config).await;
        ctrl_c.abort();
        res
    } else {
        info!(svc = %id, "read invoked");
        read_service_init(config).await
    };

    if let Err(e) = &res {
        error!(svc = %id, outcome = e.outcome(), "service not ready");
    }
    let code = report(cli.output, &id, &res).context("writing verdict")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
