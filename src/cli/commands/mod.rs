use clap::{
    Arg, ArgAction, ColorChoice, Command,
    builder::{
        ValueParser,
        styling::{AnsiColor, Effects, Styles},
    },
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
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

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("frapi")
        .about("Single-packet authorization gateway for VPN admission")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("FRAPI_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("pre-key")
                .short('k')
                .long("pre-key")
                .help("Shared pre-key clients must present in the VPNAuth header (max 256 bytes)")
                .env("FRAPI_PRE_KEY")
                .required(true),
        )
        .arg(
            Arg::new("users")
                .short('u')
                .long("users")
                .help("Registered users, comma separated: <name> or <name>=<knock>")
                .env("FRAPI_USERS")
                .value_delimiter(',')
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("salt")
                .long("salt")
                .help("Salt appended to knock material before hashing; must match clients")
                .default_value("default-salt-value")
                .env("FRAPI_SALT"),
        )
        .arg(
            Arg::new("no-salt")
                .long("no-salt")
                .help("Hash knock material without a salt (legacy client compatibility)")
                .env("FRAPI_NO_SALT")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("behind-proxy")
                .long("behind-proxy")
                .help("Trust x-forwarded-for/x-real-ip for client addresses (only behind a proxy that overwrites them)")
                .env("FRAPI_BEHIND_PROXY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("rate-limit-ttl")
                .long("rate-limit-ttl")
                .help("Seconds a failed attempt blocks new attempts from the same client/host")
                .default_value("14400")
                .env("FRAPI_RATE_LIMIT_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("allowlist-ttl")
                .long("allowlist-ttl")
                .help("Seconds an admitted client stays on the allowlist")
                .default_value("28800")
                .env("FRAPI_ALLOWLIST_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("FRAPI_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
