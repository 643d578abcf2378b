use std::io::{self as stdio, Write};

use anyhow::{Context, Result};
use clap::Args;
use prettytable::{Table, format, row};

use mol_mend::io::{CleanSdfReader, MolInfo};

use crate::commands::{self, IoParameters, run_with_spinner};

/// Report-only command that probes each record without emitting a data stream.
#[derive(Debug, Default, Args)]
pub struct InfoArgs {}

/// Cleans and probes each record, then prints a per-record summary.
pub fn run(params: &IoParameters, _args: &InfoArgs) -> Result<()> {
    let input = commands::open_input(params)?;

    let reports = run_with_spinner("Probing records", || {
        let mut records =
            CleanSdfReader::new(input).context("Failed to read the first record")?;
        let mut reports = Vec::new();
        while let Some(record) = records.next_record().context("Failed to clean record")? {
            reports.push(MolInfo::parse(&record).context("Failed to probe record")?);
        }
        Ok(reports)
    })?;

    print_report(&reports)?;
    Ok(())
}

fn print_report(reports: &[MolInfo]) -> Result<()> {
    let mut stderr = stdio::stderr().lock();

    print_boxed_label(&mut stderr, "MolMend Record Report")?;
    writeln!(&mut stderr)?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(row![
        "Record", "Name", "Version", "Atoms", "Bonds", "Single", "Double", "Aromatic"
    ]);
    for (index, info) in reports.iter().enumerate() {
        let name = if info.name.is_empty() {
            "(untitled)"
        } else {
            info.name.as_str()
        };
        table.add_row(row![
            index + 1,
            name,
            info.version,
            info.atoms,
            info.bonds,
            info.single_bonds,
            info.double_bonds,
            info.aromatic_bonds
        ]);
    }
    table
        .print(&mut stderr)
        .context("Failed to render record report")?;

    Ok(())
}

fn print_boxed_label<W: Write>(writer: &mut W, title: &str) -> stdio::Result<()> {
    let inner = format!(" {title} ");
    let width = inner.chars().count();
    writeln!(writer, "╭{}╮", "─".repeat(width))?;
    writeln!(writer, "│{}│", inner)?;
    writeln!(writer, "╰{}╯", "─".repeat(width))?;
    Ok(())
}
