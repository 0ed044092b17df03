use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use colorlab::client::{ClientError, DeviceClient};
use colorlab::config::{
    DEFAULT_CLEANING_STATION_PORT, DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_ROBOT_ARM_PORT,
    DEFAULT_SIMULATION_DEVICE_PORT,
};
use colorlab::drivers::MixRecipe;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_ANALYZER_PORT: u16 = DEFAULT_SIMULATION_DEVICE_PORT;
const DEFAULT_MIXER_PORT: u16 = DEFAULT_SIMULATION_DEVICE_PORT + 1;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn number_validator(v: String) -> Result<(), String> {
    match v.parse::<f64>() {
        Ok(n) if Duration::try_from_secs_f64(n).is_ok() => Ok(()),
        _ => Err("Value must be a non-negative number".into()),
    }
}

fn pigment_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    let mut app = app;
    for name in [
        "cyan-volume",
        "cyan-strength",
        "magenta-volume",
        "magenta-strength",
        "yellow-volume",
        "yellow-strength",
        "black-volume",
        "black-strength",
    ] {
        app = app.arg(
            Arg::with_name(name)
                .long(name)
                .value_name("N")
                .takes_value(true)
                .default_value("0")
                .validator(number_validator),
        );
    }
    app
}

#[tokio::main]
async fn main() -> CliResult {
    let matches = App::new("colorlab")
        .version("0.1.0")
        .author("Lab Automation Engineering Team")
        .about("🎨 Color Lab - command-line access to the simulated lab devices")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Device server host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Device server port (defaults to the device's standard port)")
                .takes_value(true)
                .global(true)
                .validator(|v| match v.parse::<u16>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Port must be a number between 0 and 65535".into()),
                }),
        )
        .arg(
            Arg::with_name("format")
                .short("f")
                .long("format")
                .value_name("FORMAT")
                .help("Output format")
                .takes_value(true)
                .possible_values(&["json", "table", "compact"])
                .default_value("table")
                .global(true),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .value_name("SECONDS")
                .help("Response timeout in seconds")
                .takes_value(true)
                .global(true)
                .validator(number_validator),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose output")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("call")
                .about("📨 Send a raw command to any device server")
                .arg(Arg::with_name("function").help("Operation name").required(true))
                .arg(
                    Arg::with_name("params")
                        .help("Parameters as a JSON object")
                        .default_value("{}"),
                ),
        )
        .subcommand(
            SubCommand::with_name("clean")
                .about("🧽 Run the cleaning station")
                .arg(
                    Arg::with_name("duration")
                        .help("Cleaning time in seconds")
                        .default_value("1")
                        .validator(number_validator),
                ),
        )
        .subcommand(
            SubCommand::with_name("move")
                .about("🦾 Move the robot arm between two locations")
                .arg(Arg::with_name("from").help("Start location").required(true))
                .arg(Arg::with_name("to").help("Target location").required(true)),
        )
        .subcommand(SubCommand::with_name("empty").about("🦾 Empty the container held by the robot arm"))
        .subcommand(
            pigment_args(SubCommand::with_name("mix").about("🎨 Mix pigments in a simulated mixer"))
                .arg(
                    Arg::with_name("time")
                        .long("time")
                        .value_name("SECONDS")
                        .help("Total mixing time")
                        .takes_value(true)
                        .default_value("10")
                        .validator(number_validator),
                )
                .arg(
                    Arg::with_name("speed")
                        .long("speed")
                        .value_name("SPEED")
                        .help("Vortex strength while mixing")
                        .takes_value(true)
                        .default_value("100")
                        .validator(number_validator),
                )
                .arg(
                    Arg::with_name("max-volume")
                        .long("max-volume")
                        .value_name("N")
                        .help("Volume that maps to a full-size splat")
                        .takes_value(true)
                        .validator(number_validator),
                ),
        )
        .subcommand(SubCommand::with_name("analyze").about("🔬 Measure the average color of a simulation"))
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").map(str::parse::<u16>).transpose()?;
    let format = matches.value_of("format").unwrap_or("table");
    let verbose = matches.is_present("verbose");
    let timeout = match matches.value_of("timeout") {
        Some(secs) => secs.parse::<f64>()?,
        None => DEFAULT_CLIENT_TIMEOUT_SECS,
    };
    let connection = Connection {
        host,
        port,
        timeout: Duration::try_from_secs_f64(timeout)?,
        verbose,
    };

    match matches.subcommand() {
        ("call", Some(sub_matches)) => handle_call(sub_matches, &connection, format).await?,
        ("clean", Some(sub_matches)) => {
            let duration: f64 = sub_matches.value_of("duration").unwrap_or("1").parse()?;
            let result = connection
                .call(DEFAULT_CLEANING_STATION_PORT, "clean", json!({ "duration_sec": duration }))
                .await;
            print_result("Cleaning", &result, format);
            result?;
        }
        ("move", Some(sub_matches)) => {
            let from = sub_matches.value_of("from").unwrap_or_default();
            let to = sub_matches.value_of("to").unwrap_or_default();
            let result = connection
                .call(
                    DEFAULT_ROBOT_ARM_PORT,
                    "move",
                    json!({ "from_location": from, "to_location": to }),
                )
                .await;
            print_result(&format!("Move {from} → {to}"), &result, format);
            result?;
        }
        ("empty", _) => {
            let result = connection.call(DEFAULT_ROBOT_ARM_PORT, "empty", json!({})).await;
            print_result("Empty", &result, format);
            result?;
        }
        ("mix", Some(sub_matches)) => {
            let recipe = recipe_from(sub_matches)?;
            let result = connection
                .call(DEFAULT_MIXER_PORT, "mix", serde_json::to_value(&recipe)?)
                .await;
            print_result("Mix", &result, format);
            result?;
        }
        ("analyze", _) => {
            let result = connection.call(DEFAULT_ANALYZER_PORT, "analyze", json!({})).await;
            print_color(&result, format);
            result?;
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start every device server", "colorlab-lab".bright_cyan());
            println!("  {} Clean a container", "colorlab clean 2".bright_cyan());
            println!("  {} Mix some cyan", "colorlab mix --cyan-volume 5 --cyan-strength 40".bright_cyan());
            println!("  {} Read the color back", "colorlab analyze".bright_cyan());
        }
    }

    Ok(())
}

struct Connection<'a> {
    host: &'a str,
    port: Option<u16>,
    timeout: Duration,
    verbose: bool,
}

impl Connection<'_> {
    async fn call(&self, default_port: u16, function: &str, params: Value) -> Result<Value, ClientError> {
        let port = self.port.unwrap_or(default_port);
        if self.verbose {
            println!("{} {}:{}", "Connecting to".dimmed(), self.host, port);
        }
        let mut client = DeviceClient::with_timeout(self.host, port, self.timeout);
        if let Err(e) = client.open().await {
            eprintln!("{} Failed to connect to device at {}:{}", "❌".red(), self.host, port);
            eprintln!("{} Is the lab running? Start it with:", "💡".yellow());
            eprintln!("   {}", "colorlab-lab".bright_cyan());
            return Err(e);
        }
        if self.verbose {
            println!("{} {} {}", "Sending".dimmed(), function, params);
        }
        let result = client.call(function, params).await;
        client.close().await;
        result
    }
}

async fn handle_call(matches: &ArgMatches<'_>, connection: &Connection<'_>, format: &str) -> CliResult {
    let function = matches.value_of("function").unwrap_or_default();
    let params: Value = serde_json::from_str(matches.value_of("params").unwrap_or("{}"))?;
    let Some(port) = connection.port else {
        println!("{}", "call requires --port to pick the device server".yellow());
        return Ok(());
    };
    let result = connection.call(port, function, params).await;
    print_result(function, &result, format);
    result?;
    Ok(())
}

fn recipe_from(matches: &ArgMatches<'_>) -> Result<MixRecipe, Box<dyn std::error::Error>> {
    let number = |name: &str| -> Result<f64, std::num::ParseFloatError> {
        matches.value_of(name).unwrap_or("0").parse::<f64>()
    };
    let mut recipe = MixRecipe {
        cyan_volume: number("cyan-volume")?,
        cyan_strength: number("cyan-strength")?,
        magenta_volume: number("magenta-volume")?,
        magenta_strength: number("magenta-strength")?,
        yellow_volume: number("yellow-volume")?,
        yellow_strength: number("yellow-strength")?,
        black_volume: number("black-volume")?,
        black_strength: number("black-strength")?,
        mixing_time: number("time")?,
        mixing_speed: number("speed")?,
        ..MixRecipe::default()
    };
    if matches.is_present("max-volume") {
        recipe.max_color_volume = number("max-volume")?;
    }
    Ok(recipe)
}

fn print_result(action: &str, result: &Result<Value, ClientError>, format: &str) {
    match (format, result) {
        ("json", Ok(value)) => println!("{}", value),
        ("json", Err(ClientError::Remote { message, .. })) => println!("{}", json!({ "error": message })),
        ("compact", Ok(value)) => println!("{}", value.to_string().bright_green()),
        (_, Ok(Value::Bool(true))) => {
            println!("{} {} {}", "✅".green(), action.bright_white(), "completed".bright_green())
        }
        (_, Ok(value)) => println!("{} {}: {}", "✅".green(), action.bright_white(), value.to_string().bright_cyan()),
        (_, Err(ClientError::Remote { message, .. })) => {
            println!("{} {} failed: {}", "❌".red(), action.bright_white(), message.bright_red())
        }
        (_, Err(ClientError::Timeout { timeout, .. })) => {
            println!("{} {} timed out after {:?}", "⏰".yellow(), action.bright_white(), timeout);
            println!("{} The device may still be working; try a longer --timeout", "💡".yellow());
        }
        (_, Err(e)) => println!("{} {} failed: {}", "❌".red(), action.bright_white(), e.to_string().bright_red()),
    }
}

fn print_color(result: &Result<Value, ClientError>, format: &str) {
    let rgb = match result {
        Ok(value) => serde_json::from_value::<[i64; 3]>(value.clone()).ok(),
        Err(_) => None,
    };
    match (format, rgb) {
        ("table", Some([r, g, b])) => {
            let clamp = |c: i64| c.clamp(0, 255) as u8;
            println!("\n{}", "🔬 Color Analysis".bright_blue().bold());
            println!("{}", "═════════════════".bright_blue());
            println!("Red:   {}", r.to_string().bright_red());
            println!("Green: {}", g.to_string().bright_green());
            println!("Blue:  {}", b.to_string().bright_blue());
            println!("Swatch: {}", "████████".truecolor(clamp(r), clamp(g), clamp(b)));
        }
        _ => print_result("Analyze", result, format),
    }
}
