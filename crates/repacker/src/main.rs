use anyhow::{Context, Result};
use clap::builder::{NonEmptyStringValueParser, TypedValueParser};
use clap::Parser;
use repacker::{generate, Config};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Generate a constructor that builds the destination type from the source type.
#[derive(Debug, Parser)]
#[command(name = "repacker", version)]
struct Cli {
  /// Directory of the package declaring the source type
  #[arg(
    long = "srcdir",
    value_name = "DIR",
    value_parser = NonEmptyStringValueParser::new().map(PathBuf::from)
  )]
  src_dir: PathBuf,

  /// Name of the source type
  #[arg(long = "srctype", value_name = "NAME", value_parser = NonEmptyStringValueParser::new())]
  src_type: String,

  /// Name of the destination type
  #[arg(long = "dsttype", value_name = "NAME", value_parser = NonEmptyStringValueParser::new())]
  dst_type: String,

  /// Print the generated code instead of writing it next to the destination type
  #[arg(long)]
  stdout: bool,

  /// Directory of the package declaring the destination type
  #[arg(value_name = "DIR", default_value = ".")]
  dir: PathBuf,
}

fn main() {
  let cli = Cli::parse();
  init_logging();

  if let Err(err) = run(cli) {
    error!("{:#}", err);
    process::exit(1);
  }
}

fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_ansi(std::io::stderr().is_terminal())
    .with_target(false)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let config = Config {
    dir: cli.dir,
    src_dir: cli.src_dir,
    src_type: cli.src_type,
    dst_type: cli.dst_type,
    invocation: std::env::args().skip(1).collect(),
  };

  let generated = generate(&config).with_context(|| {
    format!(
      "generating constructor for `{}` from `{}`",
      config.dst_type, config.src_type
    )
  })?;

  if cli.stdout {
    print!("{}", generated.contents);
  } else {
    generated.write()?;
    info!(path = %generated.path.display(), "wrote constructor");
  }
  Ok(())
}
