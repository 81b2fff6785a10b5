//! CLI entry point: `server <port>`.

use std::process::ExitCode;

use kvnode::ServerConfig;

fn main() -> ExitCode {
    env_logger::init();

    let port = match parse_port(std::env::args()) {
        Ok(port) => port,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match kvnode::run(ServerConfig::new(port)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_port(mut args: impl Iterator<Item = String>) -> Result<u16, String> {
    let program = args.next().unwrap_or_else(|| "server".to_string());
    let arg = args
        .next()
        .ok_or_else(|| format!("usage: {program} <port>"))?;
    arg.parse::<u16>()
        .map_err(|_| format!("invalid port {arg:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_port() {
        let args = ["server".to_string(), "8080".to_string()];
        assert_eq!(parse_port(args.into_iter()), Ok(8080));
    }

    #[test]
    fn missing_port_is_an_error() {
        let args = ["server".to_string()];
        assert!(parse_port(args.into_iter()).is_err());
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        let args = ["server".to_string(), "not-a-port".to_string()];
        assert!(parse_port(args.into_iter()).is_err());
    }
}
