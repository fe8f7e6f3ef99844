use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

/// Initialize process-wide logging: colored when stdout is a tty, leveled
/// by `level` (parsed case-insensitively, falling back to `info` on a bad
/// value), timestamped, one line per record. Every server and middleware
/// component logs through the `log` facade rather than `eprintln!`.
pub fn init(level: &str) -> Result<(), fern::InitError> {
	let level_filter = level.parse::<LevelFilter>().unwrap_or_else(|_| {
		eprintln!("unrecognized log level {level:?}, defaulting to info");
		LevelFilter::Info
	});

	let colors = ColoredLevelConfig::new()
		.info(Color::Green)
		.warn(Color::Yellow)
		.error(Color::Red)
		.debug(Color::Blue)
		.trace(Color::Magenta);

	fern::Dispatch::new()
		.format(move |out, message, record| {
			out.finish(format_args!(
				"[{} {} {}] {}",
				chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
				colors.color(record.level()),
				record.target(),
				message
			))
		})
		.level(level_filter)
		.chain(std::io::stdout())
		.apply()?;

	Ok(())
}
