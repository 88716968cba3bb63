use shadervis::{AppConfig, LoggingConfig, init_logging, run};

fn main() {
    init_logging(LoggingConfig::default());

    let config = AppConfig::from_args(std::env::args().skip(1));
    log::info!("Settings: {:?}", config.settings_path);

    if let Err(e) = run(config) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
