use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

/// Initialize terminal logging for binaries and tests. Safe to call more than
/// once: a second initialization attempt is ignored.
pub fn init_logging(level: LevelFilter) {
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}
