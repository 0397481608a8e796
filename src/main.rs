use std::io::Write;
use log::{info, error};
use env_logger::Env;
use namingindex::naming::config::NamingConfig;
use namingindex::naming::init;

fn init_logger(default_level: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from config.toml
    let config = match NamingConfig::from_toml_file("config.toml") {
        Ok(config) => config,
        Err(e) => {
            init_logger("info");
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    init_logger(&config.log_level);
    info!("Naming index {} starting up", config.id);

    let node = init(&config);

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    node.shutdown();

    Ok(())
}
