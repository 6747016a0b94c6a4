use clap::Parser as ClapParser;
use ksql::cli::{self, CheckOptions, CheckResult, CliError, StreamOptions};
use ksql::output::write_json;
use std::io::{self, BufWriter, Write};

#[derive(ClapParser)]
#[command(name = "ksql")]
#[command(about = "ksql - evaluate expressions against JSON documents")]
#[command(version)]
struct Cli {
    /// The expression to evaluate, e.g. '.properties.employees > 20'
    expression: String,

    /// JSON document (reads JSON lines from stdin if omitted or `-`)
    input: Option<String>,

    /// Print the original line when the expression is true, nothing otherwise
    #[arg(short, long)]
    filter: bool,

    /// Pretty-print the output
    #[arg(short, long)]
    pretty: bool,

    /// Only validate syntax, don't evaluate
    #[arg(long)]
    syntax_only: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every document evaluated cleanly.
fn run(cli: Cli) -> Result<bool, CliError> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let input = cli.input.filter(|s| s != "-");
    let streaming = input.is_none() && !cli.syntax_only;

    if streaming {
        if atty::is(atty::Stream::Stdin) {
            return Err(CliError::NoInput);
        }
        let expression = ksql::parse(&cli.expression)?;
        let options = StreamOptions {
            filter: cli.filter,
            pretty: cli.pretty,
        };
        let summary = cli::run_stream(&expression, io::stdin().lock(), &mut out, options)?;
        return Ok(summary.failed == 0);
    }

    let options = CheckOptions {
        expression: cli.expression,
        input,
        syntax_only: cli.syntax_only,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => writeln!(out, "Syntax is valid")?,
        CheckResult::Success(value) if cli.filter => {
            if let (ksql::Value::Bool(true), Some(input)) = (&value, &options.input) {
                writeln!(out, "{}", input)?;
            }
        }
        CheckResult::Success(value) => write_json(&mut out, &value, cli.pretty)?,
    }
    out.flush()?;
    Ok(true)
}
