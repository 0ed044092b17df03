use clap::{App, Arg};
use colorlab::config::{DEFAULT_BRIDGE_PORT, DEFAULT_HOST};
use colorlab::HeadlessSimulation;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let default_port = DEFAULT_BRIDGE_PORT.to_string();
    let matches = App::new("colorlab-headless-sim")
        .version("0.1.0")
        .author("Lab Automation Engineering Team")
        .about("🌊 Headless fluid simulation that attaches to a simulation bridge")
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Bridge host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Bridge port")
                .takes_value(true)
                .default_value(&default_port),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port: u16 = matches.value_of("port").unwrap_or(&default_port).parse()?;
    let url = format!("ws://{host}:{port}");

    let simulation = HeadlessSimulation::connect(&url).await?;
    tokio::select! {
        result = simulation.run() => match result {
            Ok(model) => info!("Simulation ended with {} splats on the canvas", model.splats().len()),
            Err(e) => {
                error!("❌ Simulation error: {}", e);
                return Err(e.into());
            }
        },
        _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown signal received"),
    }

    Ok(())
}
