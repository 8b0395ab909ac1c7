use clap::{builder::ValueParser, Arg};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn verbosity_arg() -> Arg {
    Arg::new("verbosity")
        .short('v')
        .long("verbose")
        .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
        .env("OVPANEL_LOG_LEVEL")
        .global(true)
        .action(clap::ArgAction::Count)
        .value_parser(validator_log_level())
}
