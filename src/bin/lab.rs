use clap::{App, Arg};
use colorlab::config::{LabConfig, TimingConfig};
use colorlab::Lab;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let matches = App::new("colorlab-lab")
        .version("0.1.0")
        .author("Lab Automation Engineering Team")
        .about("🧪 Starts every color lab device server, simulation bridge and viewer host")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Address every server binds to")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("instances")
                .short("n")
                .long("instances")
                .value_name("COUNT")
                .help("Number of simulation instances")
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Instance count must be a number".into()),
                }),
        )
        .arg(
            Arg::with_name("assets")
                .long("assets")
                .value_name("DIR")
                .help("Directory holding the fluid simulation viewer")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("skip-cleaning-wait")
                .long("skip-cleaning-wait")
                .help("Return from cleaning immediately"),
        )
        .arg(
            Arg::with_name("fast")
                .long("fast")
                .help("Zero every device delay (for test runs)"),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::default(),
    };
    if let Some(host) = matches.value_of("host") {
        config.host = host.to_string();
    }
    if let Some(instances) = matches.value_of("instances") {
        config.simulation.instances = instances.parse()?;
    }
    if let Some(dir) = matches.value_of("assets") {
        config.simulation.asset_dir = dir.into();
    }
    if matches.is_present("fast") {
        config.timing = TimingConfig::fast();
    }
    if matches.is_present("skip-cleaning-wait") {
        config.timing.skip_cleaning_wait = true;
    }

    println!("🧪 Color Lab");
    println!("============");

    let lab = Lab::start(config).await?;
    for group in lab.manager().groups() {
        println!("🌊 Simulation {}: open {}", group.index() + 1, group.viewer_url());
    }
    for server in lab.servers() {
        println!("🌐 {} on {}", server.name(), server.local_addr());
    }
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("🛑 Shutdown signal received");
    lab.shutdown().await;
    println!("🧪 Color Lab stopped");

    Ok(())
}
