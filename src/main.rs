use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "netframed", about = "netframe - thread-per-connection TCP/TLS/HTTP server framework")]
struct Cli {
	/// Base name of a config file to load (without extension)
	#[arg(long, global = true)]
	config: Option<String>,

	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
	/// Run the server (default)
	Run,
	/// Print the binary's version and exit
	Version,
}

fn main() {
	let cli = Cli::parse();

	if let Some(path) = &cli.config {
		// SAFETY: single-threaded at this point, before config or logging
		// has read the environment.
		unsafe { std::env::set_var("NETFRAME_CONFIG", path) };
	}

	match cli.command.unwrap_or(Commands::Run) {
		Commands::Version => {
			println!("netframed {}", env!("CARGO_PKG_VERSION"));
		}
		Commands::Run => {
			let settings = match netframe::config::load() {
				Ok(s) => s,
				Err(e) => {
					eprintln!("failed to load config: {e}");
					std::process::exit(1);
				}
			};

			if let Err(e) = netframe::logging::init(&settings.log_level) {
				eprintln!("failed to initialize logging: {e}");
				std::process::exit(1);
			}

			if let Err(e) = netframe::run(settings) {
				log::error!("server exited with error: {e:#}");
				std::process::exit(1);
			}
		}
	}
}
