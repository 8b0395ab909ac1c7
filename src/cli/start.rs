use crate::cli::{
    actions::Action, commands, dispatch::handler, globals::GlobalArgs, telemetry,
};
use anyhow::Result;

/// Start the CLI
/// # Errors
/// Returns an error if logging cannot be initialized or required arguments are missing.
pub fn start() -> Result<(Action, GlobalArgs)> {
    let matches = commands::new().get_matches();

    let verbosity = matches.get_one::<u8>("verbosity").copied().unwrap_or(0);
    telemetry::init(telemetry::level_from_verbosity(verbosity))?;

    handler(&matches)
}
