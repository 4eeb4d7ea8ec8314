use clap::Parser;
use retry_backoff::cli::{self, Cli, ColorChoice};
use retry_backoff::output;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(err) = cli::run(cli) {
        // emit_error is the only error report; anyhow's Debug form would repeat it
        let _ = output::emit_error(&err);
        std::process::exit(1);
    }
}

/// Logs go to stderr only, so stdout stays parseable.
fn init_logging(cli: &Cli) {
    let level = match (cli.debug, cli.verbose) {
        (true, _) => "debug",
        (false, true) => "info",
        _ => "warn",
    };
    let ansi = match cli.color {
        Some(ColorChoice::Always) => true,
        Some(ColorChoice::Never) => false,
        _ => std::env::var_os("NO_COLOR").is_none(),
    };
    let _ = fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .try_init();
}
