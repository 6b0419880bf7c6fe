use clap::Parser;
use log_sender::core::shutdown;
use log_sender::utils::logger;
use log_sender::{
    CliConfig, Emitter, LogSenderError, ResolvedConfig, Ticker, TomlConfig, TracingSink,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入並驗證配置
    let resolved = match &cli.config {
        Some(path) => TomlConfig::from_file(path).and_then(|toml| {
            let mut resolved = ResolvedConfig::from_provider(&toml)?;
            resolved.logging.verbose |= cli.verbose;
            if let Some(path) = &cli.log_file {
                resolved.logging.log_file = Some(path.clone());
            }
            Ok(resolved)
        }),
        None => ResolvedConfig::from_provider(&cli),
    };
    let config = match resolved {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    // 初始化日誌
    let logger = match logger::init_logger(&config.logging) {
        Ok(guard) => guard,
        Err(e) => exit_with(&e),
    };

    if cli.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }
    if logger.forwards_to_loki() {
        tracing::info!("📡 Forwarding logs to Loki");
    }
    tracing::info!(
        "🚀 Log sender started, emitting one info log {}",
        config.schedule
    );

    let (handle, signal) = shutdown::channel();
    tokio::spawn(shutdown::listen_for_termination(handle));

    let mut emitter = Emitter::new(TracingSink).with_grace_period(config.grace_period);
    let outcome = emitter
        .run(Ticker::from_policy(&config.schedule), signal)
        .await?;

    tracing::debug!("Exiting after {} emissions", outcome.final_count);
    std::process::exit(outcome.exit_code);
}

fn exit_with(e: &LogSenderError) -> ! {
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}
