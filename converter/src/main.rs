//! csvtemplate CLI - Render a CSV file through a Jinja template
//!
//! ```bash
//! csvtemplate insert.sql.j2 users.csv -H table=users        # header row, option
//! csvtemplate page.html.j2 data.tsv -T -O page.html          # TSV to a file
//! csvtemplate conf.j2 legacy.csv --input-encoding windows-1252
//! ```

use clap::Parser;
use csvtemplate::{
    context::{DEFAULT_ENCODING, DEFAULT_HEADER_PREFIX},
    convert_file, logs, parse_key_value, ConfigError, Context, RunConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "csvtemplate")]
#[command(version, about = "Render CSV/TSV files through a Jinja template", long_about = None)]
struct Cli {
    /// Jinja template to use
    template: PathBuf,

    /// CSV file to transform
    csv: PathBuf,

    /// Additional values in KEY=VALUE format, available as `options` in the template
    #[arg(value_name = "KEY=VALUE", value_parser = parse_option)]
    key_value_options: Vec<(String, String)>,

    /// First line is header
    #[arg(short = 'H', long = "header")]
    use_header: bool,

    /// Tab separated values
    #[arg(short = 'T', long)]
    tab: bool,

    /// Output file (default: stdout)
    #[arg(short = 'O', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Source and template encoding ("auto" to detect)
    #[arg(
        long,
        value_name = "ENC",
        default_value = DEFAULT_ENCODING,
        env = "CSVTEMPLATE_INPUT_ENCODING"
    )]
    input_encoding: String,

    /// Output encoding
    #[arg(
        long,
        value_name = "ENC",
        default_value = DEFAULT_ENCODING,
        env = "CSVTEMPLATE_OUTPUT_ENCODING"
    )]
    output_encoding: String,

    /// Prefix of column names when the first line is not a header
    #[arg(
        long,
        value_name = "PREFIX",
        default_value = DEFAULT_HEADER_PREFIX,
        env = "CSVTEMPLATE_HEADER_PREFIX"
    )]
    header_prefix: String,

    /// Do not print progress to stderr
    #[arg(short, long)]
    quiet: bool,
}

fn parse_option(token: &str) -> Result<(String, String), ConfigError> {
    parse_key_value(token)
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logs::set_quiet(cli.quiet);

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Context::builder(cli.template)
        .use_header(cli.use_header)
        .encoding(cli.input_encoding)
        .header_prefix(cli.header_prefix)
        .options(cli.key_value_options.into_iter().collect());
    if cli.tab {
        builder = builder.tab();
    }

    let mut config =
        RunConfig::new(builder.build(), cli.csv).with_output_encoding(cli.output_encoding);
    if let Some(output) = cli.output {
        config = config.with_output(output);
    }

    let summary = convert_file(&config)?;
    logs::log_success(format!(
        "✨ Done: {} rows read, {} lines rendered",
        summary.rows_read, summary.lines
    ));
    Ok(())
}
