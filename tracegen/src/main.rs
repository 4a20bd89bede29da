use std::{env, num::ParseFloatError, path::PathBuf, process};

use core_types::{config::SummaryConfig, ConfigError, TraceConfig};
use log::info;
use thiserror::Error;
use trace_engine::{read_trace, ReadError, TraceError, TraceSummary};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    if let Err(err) = run() {
        eprintln!("tracegen failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    match parse_command(env::args().skip(1))? {
        Command::Generate { config } => generate(config),
        Command::Verify { path, threshold } => verify(path, threshold),
    }
}

fn generate(config_path: Option<PathBuf>) -> Result<(), AppError> {
    let config = TraceConfig::load(config_path.as_deref())?;
    info!(
        "generating {} -> {} every {} minutes into {:?}",
        config.start, config.end, config.interval_minutes, config.output.path
    );
    let report = trace_engine::run(&config)?;
    println!(
        "wrote {} rows ({} bytes, crc32 {:08x}) to {}",
        report.written.rows,
        report.written.bytes,
        report.written.checksum,
        report.written.path.display()
    );
    println!("{}", report.summary);
    Ok(())
}

fn verify(path: PathBuf, threshold: Option<f64>) -> Result<(), AppError> {
    let dataset = read_trace(&path)?;
    let threshold = threshold.unwrap_or_else(|| SummaryConfig::default().green_threshold);
    let summary = TraceSummary::from_dataset(&dataset, threshold);
    let schema = dataset.schema();
    println!(
        "{}: {} ({}{}) / {} ({})",
        path.display(),
        schema.timestamp.name,
        schema.timestamp.unit.label(),
        schema
            .timestamp
            .timezone
            .as_deref()
            .map(|tz| format!(", {tz}"))
            .unwrap_or_default(),
        schema.value.name,
        schema.value.value_type.label()
    );
    println!("{summary}");
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Command {
    Generate { config: Option<PathBuf> },
    Verify { path: PathBuf, threshold: Option<f64> },
}

fn parse_command<I>(args: I) -> Result<Command, AppError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let first = args.next();
    let command = match first.as_deref() {
        None => Command::Generate { config: None },
        Some("generate") => Command::Generate {
            config: args.next().map(PathBuf::from),
        },
        Some("verify") => {
            let path = args.next().map(PathBuf::from).ok_or(AppError::Usage)?;
            let threshold = match args.next().as_deref() {
                None => None,
                Some("--threshold") => {
                    let raw = args.next().ok_or(AppError::Usage)?;
                    Some(raw.parse::<f64>().map_err(|source| AppError::Threshold { raw, source })?)
                }
                Some(_) => return Err(AppError::Usage),
            };
            Command::Verify { path, threshold }
        }
        Some(flag) if flag.starts_with('-') => return Err(AppError::Usage),
        Some(path) => Command::Generate {
            config: Some(PathBuf::from(path)),
        },
    };
    if args.next().is_some() {
        return Err(AppError::Usage);
    }
    Ok(command)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("usage: tracegen [generate] [CONFIG] | tracegen verify <FILE> [--threshold X]")]
    Usage,
    #[error("invalid --threshold {raw:?}: {source}")]
    Threshold {
        raw: String,
        #[source]
        source: ParseFloatError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Read(#[from] ReadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, AppError> {
        parse_command(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn bare_invocation_generates_with_defaults() {
        assert_eq!(parse(&[]).unwrap(), Command::Generate { config: None });
        assert_eq!(parse(&["generate"]).unwrap(), Command::Generate { config: None });
    }

    #[test]
    fn config_path_with_or_without_subcommand() {
        let expected = Command::Generate {
            config: Some(PathBuf::from("trace.toml")),
        };
        assert_eq!(parse(&["trace.toml"]).unwrap(), expected);
        assert_eq!(parse(&["generate", "trace.toml"]).unwrap(), expected);
    }

    #[test]
    fn verify_takes_optional_threshold() {
        assert_eq!(
            parse(&["verify", "out.parquet"]).unwrap(),
            Command::Verify {
                path: PathBuf::from("out.parquet"),
                threshold: None
            }
        );
        assert_eq!(
            parse(&["verify", "out.parquet", "--threshold", "80.5"]).unwrap(),
            Command::Verify {
                path: PathBuf::from("out.parquet"),
                threshold: Some(80.5)
            }
        );
    }

    #[test]
    fn malformed_arguments_are_usage_errors() {
        assert!(matches!(parse(&["verify"]), Err(AppError::Usage)));
        assert!(matches!(parse(&["--help"]), Err(AppError::Usage)));
        assert!(matches!(parse(&["verify", "a", "--threshold"]), Err(AppError::Usage)));
        assert!(matches!(parse(&["verify", "a", "--other"]), Err(AppError::Usage)));
        assert!(matches!(parse(&["generate", "a", "b"]), Err(AppError::Usage)));
        assert!(matches!(
            parse(&["verify", "a", "--threshold", "green"]),
            Err(AppError::Threshold { .. })
        ));
    }
}
