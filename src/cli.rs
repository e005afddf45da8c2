//! Command-line flags shared by the `maxspread-*` binaries.

use std::path::PathBuf;

use crate::config::{ConfigError, RunConfig, RunSettings};

/// Parsed command line: an optional config file plus flag overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub overrides: RunConfig,
}

impl CliArgs {
    /// Resolve the final settings: config file (explicit or default), then flags.
    pub fn resolve(self) -> Result<RunSettings, ConfigError> {
        let base = match &self.config_path {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::load_default()?.unwrap_or_default(),
        };
        base.overlay(self.overrides).validate()
    }
}

/// Parse `args` (without the program name). `Ok(None)` means help was printed.
pub fn parse_args(args: Vec<String>, program: &str, about: &str) -> Result<Option<CliArgs>, String> {
    let mut cli = CliArgs::default();
    let mut idx = 0usize;
    while idx < args.len() {
        let flag = args[idx].as_str();
        if matches!(flag, "-h" | "--help") {
            println!("{}", help_text(program, about));
            return Ok(None);
        }
        idx += 1;
        let value = args
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| format!("{flag} requires a value"));
        let overrides = &mut cli.overrides;
        match flag {
            "--config" => cli.config_path = Some(PathBuf::from(value?)),
            "--source" => overrides.source = Some(PathBuf::from(value?)),
            "--results" => overrides.results = Some(PathBuf::from(value?)),
            "--embeddings" => overrides.embeddings = Some(PathBuf::from(value?)),
            "--k" => overrides.k = Some(parse_number(flag, value?)?),
            "--steps" => overrides.max_steps = Some(parse_number(flag, value?)?),
            "--seed" => overrides.seed = Some(parse_number(flag, value?)?),
            "--patience" => overrides.patience = Some(parse_number(flag, value?)?),
            "--workers" => overrides.workers = Some(parse_number(flag, value?)?),
            "--max-draw-attempts" => {
                overrides.max_draw_attempts = Some(parse_number(flag, value?)?)
            }
            unknown => {
                return Err(format!(
                    "Unknown argument: {unknown}\n\n{}",
                    help_text(program, about)
                ));
            }
        }
        idx += 1;
    }
    Ok(Some(cli))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {flag} value: {value}"))
}

fn help_text(program: &str, about: &str) -> String {
    [
        program,
        "",
        about,
        "",
        "Usage:",
        format!("  {program} --source <dir> --results <dir> --k <n> --steps <n> --seed <n> [options]")
            .as_str(),
        "",
        "Options:",
        "  --config <file>            TOML file with any of the settings below.",
        "  --source <dir>             Folder of recordings or frames.",
        "  --results <dir>            Folder receiving the run folder and logs.",
        "  --k <n>                    Number of candidates to select.",
        "  --steps <n>                Improvement steps to attempt.",
        "  --seed <n>                 Seed of the random draws.",
        "  --patience <n>             Stop after n steps without improvement.",
        "  --workers <n>              Threads used to precompute features.",
        "  --max-draw-attempts <n>    Draws per step before extraction failures abort (default 16).",
        "  --embeddings <file>        Frame embeddings CSV used instead of thumbnails.",
        "  -h, --help                 Show this help.",
    ]
    .join("\n")
}
