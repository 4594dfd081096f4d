use clap::Parser;
use haas_live::configuration::config::{CommandLine, Config};
use haas_live::controller::Controller;
use log::{error, info};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
        HaaS Live :: attacker sessions as they happen  v{}
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration");

    let cli = CommandLine::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration imported successfully");

    let controller = match Controller::new(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }

    info!("Bye");
}
