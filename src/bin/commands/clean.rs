use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use mol_mend::io::CleanSdfReader;

use crate::commands::{self, IoParameters, run_with_spinner};

/// Streams records through the cleaner, writing each corrected record.
#[derive(Debug, Default, Args)]
pub struct CleanArgs {
    /// Maximum number of records to emit. When omitted, every record is cleaned.
    #[arg(long, value_name = "N")]
    pub records: Option<usize>,
}

/// Cleans the configured input stream record by record.
pub fn run(params: &IoParameters, args: &CleanArgs) -> Result<()> {
    let input = commands::open_input(params)?;
    let mut output = commands::open_output(params)?;

    let cleaned = run_with_spinner("Cleaning records", || {
        let mut records =
            CleanSdfReader::new(input).context("Failed to read the first record")?;
        let limit = args.records.unwrap_or(usize::MAX);
        let mut count = 0usize;
        while count < limit {
            match records.next_record().context("Failed to clean record")? {
                Some(record) => {
                    output
                        .write_all(record.as_bytes())
                        .context("Failed to write record")?;
                    count += 1;
                }
                None => break,
            }
        }
        output.flush().context("Failed to flush output")?;
        Ok(count)
    })?;

    eprintln!("Cleaned {cleaned} record(s).");
    Ok(())
}
