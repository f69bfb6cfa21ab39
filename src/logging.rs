use std::io::Write;

use chrono::Local;
use log::LevelFilter;

/// Installs the process logger. `RUST_LOG` overrides `level`.
/// Calling it again is a no-op.
pub fn init(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if result.is_ok() {
        log::info!("Logging initialized");
    }
}
