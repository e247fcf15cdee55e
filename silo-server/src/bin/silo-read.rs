//! Dumps the contents of an archived artifact file.
//!
//! Development aid for inspecting what the archiver wrote:
//!
//! ```bash
//! silo-read /tmp/silo/events/000000/00000000000000000000
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use bytes::Bytes;
use clap::Parser;
use silo_codec::BatchReader;

/// Print the records stored in an artifact file.
#[derive(Parser, Debug)]
#[command(name = "silo-read")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the artifact file.
    file: PathBuf,

    /// Print record payloads as lossy UTF-8 instead of byte lengths.
    #[arg(long)]
    show_values: bool,
}

fn render(data: Option<&Bytes>, show: bool) -> String {
    match data {
        None => "-".to_string(),
        Some(bytes) if show => String::from_utf8_lossy(bytes).into_owned(),
        Some(bytes) => format!("{} bytes", bytes.len()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let data = match std::fs::read(&args.file) {
        Ok(data) => Bytes::from(data),
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let reader = match BatchReader::new(data) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("error: {}: {e}", args.file.display());
            return ExitCode::FAILURE;
        }
    };
    println!("compression: {}", reader.compression());

    let mut count = 0u64;
    for record in reader {
        match record {
            Ok(record) => {
                println!(
                    "{}\t{}\t{}\t{}",
                    count,
                    record.timestamp,
                    render(record.key.as_ref(), args.show_values),
                    render(record.value.as_ref(), args.show_values),
                );
                count += 1;
            }
            Err(e) => {
                eprintln!("error: decode failed after {count} records: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    println!("{count} records");
    ExitCode::SUCCESS
}
