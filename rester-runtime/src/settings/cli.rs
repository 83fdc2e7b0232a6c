use clap::{Arg, ArgAction, Command};
use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    InvalidArguments(String),
    InvalidBinding(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArguments(err) => write!(f, "Invalid arguments: {}", err),
            Error::InvalidBinding(binding) => {
                write!(f, "Invalid binding {}, expected NAME=VALUE", binding)
            }
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub files: Vec<String>,
    pub quiet: bool,
    pub verbose: bool,
    pub bindings: Vec<(String, String)>,
    pub timeout: Option<u64>,
    pub language: Option<String>,
}

impl Cli {
    fn command() -> Command {
        Command::new("rester")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Runs JSON or YAML scripts against a REST API and checks the responses")
            .arg(
                Arg::new("files")
                    .help("Script files or URLs, run in order against one shared context")
                    .required(true)
                    .num_args(1..)
                    .index(1),
            )
            .arg(
                Arg::new("quiet")
                    .long("quiet")
                    .short('q')
                    .help("Only log errors")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("verbose"),
            )
            .arg(
                Arg::new("verbose")
                    .long("verbose")
                    .short('v')
                    .help("Log every stage of every call")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("env")
                    .long("env")
                    .short('e')
                    .help("Initial binding NAME=VALUE; VALUE is parsed as JSON when possible")
                    .action(ArgAction::Append),
            )
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .short('t')
                    .help("HTTP timeout in seconds")
                    .value_parser(clap::value_parser!(u64)),
            )
            .arg(
                Arg::new("language")
                    .long("language")
                    .short('l')
                    .help("Default expression language"),
            )
    }

    pub fn load() -> Result<Cli, Error> {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches)
    }

    pub fn try_load_from<I, T>(args: I) -> Result<Cli, Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|err| Error::InvalidArguments(err.to_string()))?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &clap::ArgMatches) -> Result<Cli, Error> {
        let files = matches
            .get_many::<String>("files")
            .map(|files| files.cloned().collect())
            .unwrap_or_default();

        let bindings = matches
            .get_many::<String>("env")
            .map(|bindings| bindings.map(|binding| parse_binding(binding)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))?;

        Ok(Cli {
            files,
            quiet: matches.get_flag("quiet"),
            verbose: matches.get_flag("verbose"),
            bindings,
            timeout: matches.get_one::<u64>("timeout").copied(),
            language: matches.get_one::<String>("language").cloned(),
        })
    }
}

fn parse_binding(binding: &str) -> Result<(String, String), Error> {
    match binding.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::InvalidBinding(binding.to_string())),
    }
}
