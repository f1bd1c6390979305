use anyhow::Context;
use clap::Parser;

use sqlweave::config::{CliConfig, EngineConfig};
use sqlweave::engine::{Configuration, RowBounds, SqlCommandType};
use sqlweave::param_object::ParamValue;

/// sqlweave - compile a statement template against a JSON parameter object
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the statement template file
    template: std::path::PathBuf,

    /// Parameter object as inline JSON
    #[arg(long, default_value = "{}")]
    params: String,

    /// Statement id used in logs and error messages
    #[arg(long, default_value = "cli")]
    statement_id: String,

    /// SQL verb of the statement (select, insert, update, delete)
    #[arg(long, default_value = "select")]
    command: String,

    /// Keep template whitespace instead of collapsing runs
    #[arg(long)]
    no_shrink_whitespace: bool,

    /// Upper bound on <foreach> unrolling
    #[arg(long, default_value_t = 10_000)]
    max_loop_unroll: usize,
}

fn main() -> anyhow::Result<()> {
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = EngineConfig::from_cli(CliConfig {
        shrink_whitespace: !cli.no_shrink_whitespace,
        template_cache_enabled: true,
        max_loop_unroll: cli.max_loop_unroll,
    })?;

    let template = std::fs::read_to_string(&cli.template)
        .with_context(|| format!("cannot read template file {}", cli.template.display()))?;
    let command: SqlCommandType = cli
        .command
        .parse()
        .map_err(|verb| anyhow::anyhow!("unknown command type '{}'", verb))?;
    let params: serde_json::Value =
        serde_json::from_str(&cli.params).context("parameter object is not valid JSON")?;

    let configuration = Configuration::new(config);
    configuration.add_statement(&cli.statement_id, command, &template)?;

    let bound = configuration.compile_statement(&cli.statement_id, ParamValue::from(params))?;
    let args = configuration.bind_arguments(&bound)?;

    println!("SQL: {}", bound.sql());
    println!("Arguments ({}):", args.len());
    for (position, arg) in args.iter().enumerate() {
        println!("  {}: {}", position + 1, arg);
    }

    let key = configuration.build_cache_key(&cli.statement_id, &bound, &args, RowBounds::default());
    log::debug!("cache key: {:?}", key);

    Ok(())
}
