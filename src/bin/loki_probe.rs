use clap::Parser;
use log_sender::adapters::loki::LokiClient;
use log_sender::core::{LogRecord, RecordShipper};
use log_sender::domain::model::Severity;
use log_sender::utils::logger;
use log_sender::utils::validation::Validate;
use log_sender::{LogSenderError, LoggingConfig, LokiConfig};

#[derive(Parser)]
#[command(name = "loki_probe")]
#[command(about = "Push a single test record to the configured Loki sink")]
struct Args {
    /// Loki base URL, overrides GRAFANA_HOST
    #[arg(long)]
    host: Option<String>,

    /// Credentials as user:password, overrides GRAFANA_BASICAUTH
    #[arg(long)]
    basic_auth: Option<String>,

    /// Message of the test record
    #[arg(short, long, default_value = "loki_probe connectivity check")]
    message: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::from_env()?;
    logging.verbose = args.verbose;
    let loki = match (&args.host, logging.loki.take()) {
        (Some(host), existing) => LokiConfig::new(
            host.clone(),
            args.basic_auth
                .clone()
                .or(existing.and_then(|loki| loki.basic_auth)),
            &logging.service_name,
        ),
        (None, Some(mut existing)) => {
            if args.basic_auth.is_some() {
                existing.basic_auth = args.basic_auth.clone();
            }
            existing
        }
        (None, None) => {
            let e = LogSenderError::MissingConfigError {
                field: "GRAFANA_HOST (or --host)".to_string(),
            };
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(e.exit_code());
        }
    };

    // The probe reports on the console only; it must not forward its own logs.
    logger::init_logger(&logging)?;
    logging.loki = Some(loki.clone());
    logging.validate()?;

    let client = LokiClient::new(&loki)?;
    tracing::info!("🔍 Probing {}", client.push_url());

    let mut record = LogRecord::new(Severity::Info, args.message.clone());
    record.fields = logging.default_fields();
    record.insert("probe", true);

    match client.ship(&[record]).await {
        Ok(()) => {
            tracing::info!("✅ Loki accepted the test record");
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Loki probe failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}
