use anyhow::Context;
use clap::Parser;
use echoload::bench::Benchmarker;
use echoload::channel::{install_crypto_provider, DatagramTransport, Transport, WebSocketTransport};
use echoload::config::{BenchConfig, Cli, OutputFormat, TransportKind};
use echoload::metrics::{start_metrics_server, MetricsConfig};
use echoload::stats::{ConsoleReporter, JsonReporter, ReportSink, RoundReport};
use std::sync::Arc;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    install_crypto_provider();

    if let Some(addr) = cli.metrics_addr {
        start_metrics_server(MetricsConfig::with_addr(addr))
            .context("failed to start metrics exporter")?;
    }

    let config = cli.bench_config();
    let reporter: Arc<dyn ReportSink> = match cli.output {
        OutputFormat::Text => Arc::new(ConsoleReporter::stdout()),
        OutputFormat::Json => Arc::new(JsonReporter::stdout()),
    };

    let reports = match config.transport {
        TransportKind::Websocket => run(WebSocketTransport::new(), config, reporter).await?,
        TransportKind::Datagram => {
            let transport = DatagramTransport::new(config.insecure_skip_verify);
            run(transport, config, reporter).await?
        }
    };

    tracing::info!("Finished {} rounds", reports.len());
    Ok(())
}

async fn run<T: Transport>(
    transport: T,
    config: BenchConfig,
    reporter: Arc<dyn ReportSink>,
) -> anyhow::Result<Vec<RoundReport>> {
    let mut bench = Benchmarker::new(transport, config, reporter)?;
    let run_id = bench.run_id().to_string();
    bench
        .run()
        .await
        .with_context(|| format!("benchmark run {run_id} failed"))
}
