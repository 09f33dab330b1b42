use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use athena2spark::config::Config;
use athena2spark::error::render_excerpt;
use athena2spark::{render, Compiler, GeneratedProgram};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Pyspark,
    Sql,
}

/// Compile an Athena SQL query into a dependency-ordered Spark program
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// SQL file to compile
    sql_file: PathBuf,

    /// Business context label attached to the program
    #[arg(long)]
    context: String,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: Format,

    /// Write the output into this directory instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Config file (defaults to the user config, if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let sql = fs::read_to_string(&cli.sql_file)
        .with_context(|| format!("Failed to read {}", cli.sql_file.display()))?;

    let program = match Compiler::new(&config).compile(&sql, &cli.context) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: {}", cli.sql_file.display(), e);
            let excerpt = render_excerpt(&sql, e.span());
            if !excerpt.is_empty() {
                eprintln!("{}", excerpt);
            }
            return Ok(ExitCode::from(1));
        }
    };
    info!(units = program.units.len(), "compiled {}", cli.sql_file.display());

    let (text, file_name) = render_output(&program, &config, cli.format, &cli.sql_file);
    match cli.output {
        Some(dir) => {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(file_name);
            fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(ExitCode::SUCCESS)
}

fn render_output(
    program: &GeneratedProgram,
    config: &Config,
    format: Format,
    sql_file: &std::path::Path,
) -> (String, String) {
    let stem = sql_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.context.clone());
    match format {
        Format::Json => (render::to_json(program), format!("{}.json", stem)),
        Format::Sql => (render::to_sql_script(program), format!("{}.sql", stem)),
        Format::Pyspark => (
            render::to_pyspark(program, &config.job_prefix),
            render::job_file_name(&config.job_prefix, &program.context),
        ),
    }
}
