use std::env;

use gleemanager::{app, config::Config, logging};

/// Starts the GleeManager server
///
/// Usage: `gleemanager [BIND_ADDR] [DATA_DIR]`; see `Config` for the
/// `GLEE_*` environment variables.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = Config::from_env_and_args(env::args())?;
    log::info!("using data directory {}", config.data_dir.display());

    app::run(config).await
}
