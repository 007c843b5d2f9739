//! A CLI tool for inspecting the contents of a das2 or das3 stream
//! by printing one table row per packet.
use clap::Parser;
use das2_dump::DumpOptions;
use snafu::Report;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::{error, Level};

/// Exit code for when an error emerged while reading the stream.
const ERROR_READ: i32 = -2;

/// Dump the packets of das2/das3 stream files
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// The stream file(s) to read; standard input when absent
    files: Vec<PathBuf>,
    /// Reject legacy framing in version 3 streams and headers
    /// with schema-visible omissions
    #[clap(short = 's', long = "strict")]
    strict: bool,
    /// Print more logging messages
    #[clap(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let app = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if app.verbose {
                Level::DEBUG
            } else {
                Level::WARN
            })
            .finish(),
    )
    .unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
    });

    let options = DumpOptions::new().strict(app.strict);
    let stdout = io::stdout();

    if app.files.is_empty() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            eprintln!("No input; give a file name or pipe a stream in");
            std::process::exit(ERROR_READ);
        }
        if let Err(e) = options.dump_stream(stdin.lock(), stdout.lock()) {
            error!("{}", Report::from_error(e));
            std::process::exit(ERROR_READ);
        }
        return;
    }

    for path in &app.files {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                std::process::exit(ERROR_READ);
            }
        };
        if app.files.len() > 1 {
            println!("# {}", path.display());
        }
        if let Err(e) = options.dump_stream(file, stdout.lock()) {
            error!("{}: {}", path.display(), Report::from_error(e));
            std::process::exit(ERROR_READ);
        }
    }
}
