//! Probes a Mol record for summary facts without building a molecule.
//!
//! Different producers write most fields of a record differently, so the probe
//! only parses the few things callers actually compare: the title, the syntax
//! version, the declared counts, and a tally of bond orders.

use crate::io::error::Error;
use crate::io::line_source::PushbackLineReader;
use crate::model::types::CtabVersion;
use std::io::BufRead;

const FORMAT: &str = "MOL";

/// Summary facts read from a single Mol record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MolInfo {
    pub name: String,
    pub version: CtabVersion,
    pub atoms: usize,
    pub bonds: usize,
    pub single_bonds: usize,
    pub double_bonds: usize,
    pub aromatic_bonds: usize,
}

impl MolInfo {
    /// Probes a record held in memory.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Self::from_reader(text.as_bytes())
    }

    /// Probes the first record of a buffered stream.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut lines = PushbackLineReader::new(reader);
        let mut info = MolInfo {
            name: read_required(&mut lines, "title line")?.trim().to_string(),
            ..MolInfo::default()
        };
        read_required(&mut lines, "program line")?;
        read_required(&mut lines, "comment line")?;

        let counts = read_required(&mut lines, "counts line")?;
        if counts.contains("V3000") {
            info.version = CtabVersion::V3000;
            parse_v3000(&mut info, &mut lines)?;
        } else {
            info.version = CtabVersion::V2000;
            parse_v2000(&mut info, &mut lines, &counts)?;
        }
        Ok(info)
    }
}

fn parse_v2000<R: BufRead>(
    info: &mut MolInfo,
    lines: &mut PushbackLineReader<R>,
    counts: &str,
) -> Result<(), Error> {
    let mut tokens = counts.split_whitespace();
    let atoms = tokens.next().and_then(|t| t.parse::<usize>().ok());
    let bonds = tokens.next().and_then(|t| t.parse::<usize>().ok());
    let (Some(atoms), Some(bonds)) = (atoms, bonds) else {
        return Err(Error::parse(
            FORMAT,
            None,
            lines.line_number(),
            format!("invalid counts line '{}'", counts.trim_end()),
        ));
    };
    info.atoms = atoms;
    info.bonds = bonds;

    for _ in 0..atoms {
        read_required(lines, "atom line")?;
    }
    for _ in 0..bonds {
        let line = read_required(lines, "bond line")?;
        let order = line
            .split_whitespace()
            .nth(2)
            .and_then(|t| t.parse::<i32>().ok())
            .ok_or_else(|| {
                Error::parse(
                    FORMAT,
                    None,
                    lines.line_number(),
                    format!("invalid bond line '{}'", line.trim_end()),
                )
            })?;
        tally_bond_order(info, order);
    }
    Ok(())
}

fn parse_v3000<R: BufRead>(
    info: &mut MolInfo,
    lines: &mut PushbackLineReader<R>,
) -> Result<(), Error> {
    loop {
        let line = read_required(lines, "M  V30 COUNTS line")?;
        let Some(rest) = v30_content(&line) else {
            continue;
        };
        if let Some(counts) = rest.strip_prefix("COUNTS") {
            let mut tokens = counts.split_whitespace();
            let atoms = tokens.next().and_then(|t| t.parse::<usize>().ok());
            let bonds = tokens.next().and_then(|t| t.parse::<usize>().ok());
            let (Some(atoms), Some(bonds)) = (atoms, bonds) else {
                return Err(Error::parse(
                    FORMAT,
                    None,
                    lines.line_number(),
                    format!("invalid counts line '{}'", line.trim_end()),
                ));
            };
            info.atoms = atoms;
            info.bonds = bonds;
            break;
        }
    }

    loop {
        let line = read_required(lines, "bond block")?;
        if v30_content(&line).map_or(false, |rest| rest.trim() == "BEGIN BOND") {
            break;
        }
    }

    for _ in 0..info.bonds {
        let line = read_required(lines, "bond line")?;
        let order = v30_content(&line)
            .and_then(|rest| rest.split_whitespace().nth(1))
            .and_then(|t| t.parse::<i32>().ok())
            .ok_or_else(|| {
                Error::parse(
                    FORMAT,
                    None,
                    lines.line_number(),
                    format!("invalid bond line '{}'", line.trim_end()),
                )
            })?;
        tally_bond_order(info, order);
    }
    Ok(())
}

fn tally_bond_order(info: &mut MolInfo, order: i32) {
    match order {
        1 => info.single_bonds += 1,
        2 => info.double_bonds += 1,
        4 => info.aromatic_bonds += 1,
        _ => {}
    }
}

/// Returns the content after the `M  V30` tag of a V3000 line.
fn v30_content(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('M')?.trim_start();
    rest.strip_prefix("V30").map(str::trim_start)
}

fn read_required<R: BufRead>(
    lines: &mut PushbackLineReader<R>,
    what: &str,
) -> Result<String, Error> {
    lines
        .read_line()?
        .ok_or_else(|| Error::truncated(FORMAT, None, format!("input ended before the {}", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUTADIENE: &str = concat!(
        "butadiene\n",
        "  MolMend  2D\n",
        "\n",
        "  4  3  0  0  0  0  0  0  0  0999 V2000\n",
        "    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    1.3750    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    2.0625    1.1908    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    3.4375    1.1908    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "  1  2  2  0  0  0  0\n",
        "  2  3  1  0  0  0  0\n",
        "  3  4  2  0  0  0  0\n",
        "M  END"
    );

    #[test]
    fn v2000_record_is_probed() {
        let info = MolInfo::parse(BUTADIENE).expect("record should probe");

        assert_eq!(info.name, "butadiene");
        assert_eq!(info.version, CtabVersion::V2000);
        assert_eq!(info.atoms, 4);
        assert_eq!(info.bonds, 3);
        assert_eq!(info.single_bonds, 1);
        assert_eq!(info.double_bonds, 2);
        assert_eq!(info.aromatic_bonds, 0);
    }

    #[test]
    fn v3000_record_is_probed() {
        const RECORD: &str = concat!(
            "ethane\n",
            "  MolMend  2D\n",
            "\n",
            "  0  0  0     0  0            999 V3000\n",
            "M  V30 BEGIN CTAB\n",
            "M  V30 COUNTS 2 1 0 0 0\n",
            "M  V30 BEGIN ATOM\n",
            "M  V30 1 C 0.0 0.0 0.0 0\n",
            "M  V30 2 C 1.54 0.0 0.0 0\n",
            "M  V30 END ATOM\n",
            "M  V30 BEGIN BOND\n",
            "M  V30 1 1 1 2\n",
            "M  V30 END BOND\n",
            "M  V30 END CTAB\n",
            "M  END"
        );
        let info = MolInfo::parse(RECORD).expect("record should probe");

        assert_eq!(info.name, "ethane");
        assert_eq!(info.version, CtabVersion::V3000);
        assert_eq!(info.atoms, 2);
        assert_eq!(info.bonds, 1);
        assert_eq!(info.single_bonds, 1);
        assert_eq!(info.double_bonds, 0);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let err = MolInfo::parse("name\nprogram\n").expect_err("truncated record should fail");
        match err {
            Error::TruncatedBlock { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_counts_line_is_rejected() {
        let err = MolInfo::parse("name\n\n\nnot a counts line\n")
            .expect_err("bad counts line should fail");
        match err {
            Error::Parse { details, .. } => {
                assert!(details.contains("counts line"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
