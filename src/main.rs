use recadmin::config::{self, Config};
use recadmin::shell::{Command, Shell};
use recadmin::{RecadminError, Records, Result};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: recadmin [--config FILE] [DB_PATH] <tables|ls|insert|select|update|drop>";

/// Command line after option parsing
#[derive(Debug, PartialEq)]
struct Invocation {
    config: Option<PathBuf>,
    database: Option<String>,
    command: Command,
}

fn parse_args(args: &[String]) -> std::result::Result<Invocation, String> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option: {}", flag)),
            _ => positional.push(arg.clone()),
        }
    }

    let (database, name) = match positional.as_slice() {
        [name] => (None, name),
        [database, name] => (Some(database.clone()), name),
        _ => return Err(USAGE.to_string()),
    };
    let command = Command::parse(name).ok_or_else(|| format!("unknown command: {}", name))?;
    Ok(Invocation {
        config,
        database,
        command,
    })
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(invocation: Invocation) -> Result<i32> {
    let config = config::load_or_default(invocation.config.as_deref())?;
    init_logging(&config);

    let path = config.database_path(invocation.database.as_deref())?;
    info!(path = %path.display(), command = ?invocation.command, "starting recadmin");
    let records = Records::new(config.provider(path));

    let stdin = io::stdin();
    let mut shell = Shell::new(&records, stdin.lock(), io::stdout()).with_format(config.output.format);
    shell.run(invocation.command)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    match run(invocation) {
        Ok(status) => ExitCode::from(status as u8),
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("{}", err);
            match err {
                RecadminError::Config(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_command_only() {
        let invocation = parse_args(&args(&["ls"])).unwrap();
        assert_eq!(invocation.command, Command::Ls);
        assert!(invocation.database.is_none());
    }

    #[test]
    fn test_parse_path_and_config() {
        let invocation = parse_args(&args(&["--config", "r.toml", "app.db", "update"])).unwrap();
        assert_eq!(invocation.config, Some(PathBuf::from("r.toml")));
        assert_eq!(invocation.database.as_deref(), Some("app.db"));
        assert_eq!(invocation.command, Command::Update);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["app.db", "truncate"])).is_err());
        assert!(parse_args(&args(&["--verbose", "ls"])).is_err());
        assert!(parse_args(&args(&["--config"])).is_err());
    }
}
