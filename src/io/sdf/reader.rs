//! Streaming access to cleaned records: an iterator that drives the record
//! state machine once per pull, plus the string and file entry points.

use crate::io::error::Error;
use crate::io::line_source::PushbackLineReader;
use crate::io::sdf::cleaner::{ParseFacts, ReadState};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Iterator of cleaned molecule records from SD or Mol formatted input.
///
/// Each pull reads one complete record through the cleaning state machine and
/// returns the corrected text, delimiter included. The first record is
/// pre-fetched at construction so [`has_next`](Self::has_next) is accurate
/// before anything has been pulled.
#[derive(Debug)]
pub struct CleanSdfReader<R> {
    reader: Option<PushbackLineReader<R>>,
    buffer: String,
    state: ReadState,
    next_record: Option<String>,
    pending_error: Option<Error>,
}

impl<R: BufRead> CleanSdfReader<R> {
    pub fn new(source: R) -> Result<Self, Error> {
        let mut records = Self {
            reader: Some(PushbackLineReader::new(source)),
            buffer: String::with_capacity(10 * 1024),
            state: ReadState::Begin,
            next_record: None,
            pending_error: None,
        };
        records.next_record = records.read_next_record()?;
        Ok(records)
    }

    fn read_next_record(&mut self) -> Result<Option<String>, Error> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        self.buffer.clear();
        let mut facts = ParseFacts::default();
        while self.state != ReadState::Eof {
            self.state = self.state.read_clean(reader, &mut self.buffer, &mut facts)?;
            // the delimiter state belongs to the next record; running it now
            // would consume that record's leading lines
            if self.state == ReadState::Delimiter {
                break;
            }
        }

        if self.buffer.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.buffer.clone()))
        }
    }

    /// Returns whether another cleaned record (or a pending failure) is
    /// waiting to be pulled.
    pub fn has_next(&self) -> bool {
        self.next_record.is_some() || self.pending_error.is_some()
    }

    /// Returns the next cleaned record, or `None` once the input is drained.
    ///
    /// A record that fails to clean surfaces as an error on the pull that
    /// would have produced it; records cleaned before the failure are never
    /// lost.
    pub fn next_record(&mut self) -> Result<Option<String>, Error> {
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        match self.next_record.take() {
            None => Ok(None),
            Some(record) => {
                match self.read_next_record() {
                    Ok(next) => self.next_record = next,
                    Err(err) => self.pending_error = Some(err),
                }
                Ok(Some(record))
            }
        }
    }

    /// Releases the underlying stream. Idempotent; every later pull returns
    /// `None`.
    pub fn close(&mut self) {
        self.next_record = None;
        self.pending_error = None;
        self.reader = None;
    }
}

impl<R: BufRead> Iterator for CleanSdfReader<R> {
    type Item = Result<String, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Cleans a single Mol record held in memory and returns the corrected text.
pub fn clean_mol_text(text: &str) -> Result<String, Error> {
    let mut records = CleanSdfReader::new(text.as_bytes())?;
    Ok(records.next_record()?.unwrap_or_default())
}

/// Opens an SD or Mol file and returns a streaming iterator of cleaned
/// records.
pub fn clean_sdf_file<P: AsRef<Path>>(path: P) -> Result<CleanSdfReader<BufReader<File>>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    CleanSdfReader::new(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CLEAN_RECORD: &str = concat!(
        "pentane\n",
        "  MolMend  2D\n",
        "\n",
        "  5  4  0  0  0  0  0  0  0  0999 V2000\n",
        "    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    1.3750    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    2.0625    1.1908    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    3.4375    1.1908    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "    4.1250    2.3816    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        "  1  2  1  0  0  0  0\n",
        "  2  3  1  0  0  0  0\n",
        "  3  4  1  0  0  0  0\n",
        "  4  5  1  0  0  0  0\n",
        "M  END"
    );

    fn record_with_properties(properties: &str) -> String {
        concat!(
            "query\n",
            "  MolMend  2D\n",
            "\n",
            "  0  0  0  0  0  0  0  0  0  0999 V2000\n",
        )
        .to_string()
            + properties
            + "M  END"
    }

    #[test]
    fn clean_record_is_returned_unchanged() {
        let cleaned = clean_mol_text(CLEAN_RECORD).expect("clean record should clean");
        assert_eq!(cleaned, CLEAN_RECORD);
    }

    #[test]
    fn sloppy_end_terminator_is_normalized() {
        let input = CLEAN_RECORD.replace("M  END", "M END   created by hand");
        let cleaned = clean_mol_text(&input).expect("record should clean");
        assert_eq!(cleaned, CLEAN_RECORD);
    }

    #[test]
    fn missing_title_line_is_restored() {
        let input = CLEAN_RECORD.replacen("pentane\n", "", 1);
        let cleaned = clean_mol_text(&input).expect("record should be repaired");
        assert_eq!(cleaned, CLEAN_RECORD.replacen("pentane", "", 1));
    }

    #[test]
    fn misaligned_atom_and_bond_lines_are_repadded() {
        let input = CLEAN_RECORD
            .replacen("    0.0000    0.0000", "0.0000    0.0000", 1)
            .replacen("  1  2  1  0  0  0  0", "1  2  1  0  0  0  0", 1);
        let cleaned = clean_mol_text(&input).expect("record should be repaired");
        assert_eq!(cleaned, CLEAN_RECORD);
    }

    #[test]
    fn shifted_counts_line_is_rewritten_canonically() {
        let input = CLEAN_RECORD.replacen(
            "  5  4  0  0  0  0  0  0  0  0999 V2000",
            "5 4 0 0 0 0 0 0 0 0999 V2000",
            1,
        );
        let cleaned = clean_mol_text(&input).expect("record should be repaired");
        assert_eq!(cleaned, CLEAN_RECORD);
    }

    #[test]
    fn output_atom_and_bond_counts_match_the_carried_lines() {
        let cleaned = clean_mol_text(CLEAN_RECORD).expect("record should clean");
        let lines: Vec<&str> = cleaned.lines().collect();

        let counts = lines[3];
        let atoms: usize = counts[0..3].trim().parse().unwrap();
        let bonds: usize = counts[3..6].trim().parse().unwrap();
        let atom_lines = lines[4..4 + atoms]
            .iter()
            .filter(|l| l.contains('.'))
            .count();
        assert_eq!(atom_lines, atoms);
        assert_eq!(lines[4 + atoms..4 + atoms + bonds].len(), bonds);
    }

    #[test]
    fn unknown_sgroup_type_drops_declaration_and_references() {
        let input = record_with_properties("M  STY  1  12 XYZ\nM  SAL  12  2   1   2\n");
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(!cleaned.contains("STY"));
        assert!(!cleaned.contains("SAL"));
        assert!(cleaned.ends_with("M  END"));
    }

    #[test]
    fn sgroup_atom_list_is_filtered_and_rechunked() {
        let input = record_with_properties(concat!(
            "M  STY  1   1 GEN\n",
            "M  SAL   1 17   0   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15  16\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains(
            "M  SAL   1 15   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15\n"
        ));
        assert!(cleaned.contains("M  SAL   1  1  16\n"));
        assert!(!cleaned.contains("M  SAL   1 17"));
        assert_eq!(cleaned.lines().filter(|l| l.contains("SAL")).count(), 2);
    }

    #[test]
    fn parent_atom_lines_require_a_multiple_group() {
        let input = record_with_properties(concat!(
            "M  STY  2   1 GEN   2 MUL\n",
            "M  SPA   1  2   1   2\n",
            "M  SPA   2  2   1   2\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(!cleaned.contains("M  SPA   1"));
        assert!(cleaned.contains("M  SPA   2  2   1   2\n"));
    }

    #[test]
    fn overlong_charge_list_is_rechunked() {
        let input = record_with_properties(
            "M  CHG 10   1  -1   2   1   3  -1   4   1   5  -1   6   1   7  -1   8   1   9  -1  10   1\n",
        );
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains(
            "M  CHG  8   1  -1   2   1   3  -1   4   1   5  -1   6   1   7  -1   8   1\n"
        ));
        assert!(cleaned.contains("M  CHG  2   9  -1  10   1\n"));
    }

    #[test]
    fn short_charge_list_passes_through_verbatim() {
        let input = record_with_properties("M  CHG  2   1  -1   2   1\n");
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains("M  CHG  2   1  -1   2   1\n"));
    }

    #[test]
    fn sty_redeclarations_are_ignored() {
        let input = record_with_properties(concat!(
            "M  STY  2   1 GEN   2 DAT\n",
            "M  STY  2   1 MUL   3 SUP\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains("M  STY  2   1 GEN   2 DAT\n"));
        assert!(cleaned.contains("M  STY  1   3 SUP\n"));
        assert!(!cleaned.contains("MUL"));
    }

    #[test]
    fn overlong_sty_line_is_rechunked() {
        let input = record_with_properties(concat!(
            "M  STY 10   1 GEN   2 GEN   3 GEN   4 GEN   5 GEN   6 GEN   7 GEN   8 GEN",
            "   9 GEN  10 GEN\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains(
            "M  STY  8   1 GEN   2 GEN   3 GEN   4 GEN   5 GEN   6 GEN   7 GEN   8 GEN\n"
        ));
        assert!(cleaned.contains("M  STY  2   9 GEN  10 GEN\n"));
    }

    #[test]
    fn expansion_list_is_rechunked() {
        let values: Vec<String> = (1..=18).map(|v| format!("{:>3}", v)).collect();
        let input = record_with_properties(&format!("M  SDS EXP 18 {}\n", values.join(" ")));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains(
            "M  SDS EXP 15   1   2   3   4   5   6   7   8   9  10  11  12  13  14  15\n"
        ));
        assert!(cleaned.contains("M  SDS EXP  3  16  17  18\n"));
    }

    #[test]
    fn data_block_continuations_merge_into_a_single_terminator() {
        let input = record_with_properties(concat!(
            "M  STY  1   5 DAT\n",
            "M  SCD   5 part-one-\n",
            "M  SCD   5 part-two-\n",
            "M  SED   5 end\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains("M  SED   5 part-one-part-two-end\n"));
        assert!(!cleaned.contains("M  SCD"));
    }

    #[test]
    fn dangling_data_continuation_is_flushed_with_a_terminator() {
        let input = record_with_properties(concat!(
            "M  STY  1   5 DAT\n",
            "M  SCD   5 unterminated\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert!(cleaned.contains("M  SED   5 unterminated\nM  END"));
    }

    #[test]
    fn unrelated_line_interrupting_a_data_block_forces_a_flush() {
        let input = record_with_properties(concat!(
            "M  STY  1   5 DAT\n",
            "M  SCD   5 first\n",
            "M  CHG  1   1   1\n",
            "M  SCD   5 second\n",
        ));
        let cleaned = clean_mol_text(&input).expect("record should clean");

        let sed_first = cleaned.find("M  SED   5 first\n").expect("first flush");
        let chg = cleaned.find("M  CHG  1   1   1\n").expect("charge line");
        let sed_second = cleaned.find("M  SED   5 second\n").expect("second flush");
        assert!(sed_first < chg && chg < sed_second);
    }

    #[test]
    fn data_items_are_preserved_and_extra_blanks_dropped() {
        let input = CLEAN_RECORD.to_string() + "\n\n\n> <MW>\n72.15\n\n$$$$";
        let cleaned = clean_mol_text(&input).expect("record should clean");

        assert_eq!(cleaned, CLEAN_RECORD.to_string() + "\n> <MW>\n72.15\n\n$$$$");
    }

    #[test]
    fn multi_record_files_yield_records_in_order() {
        let second = CLEAN_RECORD.replacen("pentane", "hexane", 1);
        let input = format!("{}\n$$$$\n{}\n$$$$", CLEAN_RECORD, second);
        let mut records = CleanSdfReader::new(input.as_bytes()).expect("input should open");

        assert!(records.has_next());
        let first = records.next_record().expect("first record").expect("present");
        assert_eq!(first, format!("{}\n$$$$\n", CLEAN_RECORD));
        let next = records.next_record().expect("second record").expect("present");
        assert_eq!(next, format!("{}\n$$$$", second));
        assert!(!records.has_next());
        assert_eq!(records.next_record().expect("drained"), None);
    }

    #[test]
    fn extra_blank_lines_between_records_collapse_to_one() {
        let second = CLEAN_RECORD.replacen("pentane", "", 1);
        let input = format!("{}\n$$$$\n\n\n\n{}\n$$$$", CLEAN_RECORD, second);
        let records: Vec<String> = CleanSdfReader::new(input.as_bytes())
            .expect("input should open")
            .collect::<Result<_, _>>()
            .expect("both records should clean");

        assert_eq!(records.len(), 2);
        // the absorbed blanks come back as the single blank title line
        assert_eq!(records[1], format!("{}\n$$$$", second));
    }

    #[test]
    fn truncated_atom_block_is_a_structural_error() {
        let input = concat!(
            "pentane\n",
            "  MolMend  2D\n",
            "\n",
            "  5  4  0  0  0  0  0  0  0  0999 V2000\n",
            "    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0\n",
        );
        let err = clean_mol_text(input).expect_err("truncated block should fail");

        match err {
            Error::TruncatedBlock { details, .. } => {
                assert!(details.contains("atom block"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_end_terminator_is_a_structural_error() {
        let input = concat!(
            "query\n",
            "  MolMend  2D\n",
            "\n",
            "  0  0  0  0  0  0  0  0  0  0999 V2000\n",
            "M  CHG  1   1   1\n",
        );
        let err = clean_mol_text(input).expect_err("missing terminator should fail");

        match err {
            Error::TruncatedBlock { details, .. } => {
                assert!(details.contains("M  END"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_counts_line_is_a_parse_error() {
        let input = concat!(
            "query\n",
            "  MolMend  2D\n",
            "\n",
            "five four  0  0  0  0  0  0  0  0999 V2000\n",
            "M  END",
        );
        let err = clean_mol_text(input).expect_err("bad counts should fail");

        match err {
            Error::Parse { details, .. } => {
                assert!(details.contains("counts line"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn record_before_a_broken_record_is_not_lost() {
        let input = format!("{}\n$$$$\ngarbage header\n", CLEAN_RECORD);
        let mut records = CleanSdfReader::new(input.as_bytes()).expect("input should open");

        let first = records
            .next_record()
            .expect("first record should survive")
            .expect("present");
        assert_eq!(first, format!("{}\n$$$$\n", CLEAN_RECORD));
        assert!(records.has_next());
        assert!(records.next_record().is_err());
    }

    #[test]
    fn empty_input_yields_no_records() {
        let mut records = CleanSdfReader::new("".as_bytes()).expect("empty input is fine");
        assert!(!records.has_next());
        assert_eq!(records.next_record().expect("no records"), None);

        assert_eq!(clean_mol_text("").expect("empty text"), "");
    }

    #[test]
    fn close_is_idempotent() {
        let input = format!("{}\n$$$$\n{}\n$$$$", CLEAN_RECORD, CLEAN_RECORD);
        let mut records = CleanSdfReader::new(input.as_bytes()).expect("input should open");

        records.close();
        records.close();
        assert!(!records.has_next());
        assert_eq!(records.next_record().expect("closed"), None);
    }

    #[test]
    fn v3000_records_pass_through_with_normalized_blocks() {
        let input = concat!(
            "stilbene\n",
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
        let cleaned = clean_mol_text(input).expect("v3000 record should clean");
        assert_eq!(cleaned, input);

        let sloppy = input.replace("M  V30 BEGIN CTAB", "M V30  BEGIN CTAB");
        let cleaned = clean_mol_text(&sloppy).expect("v3000 record should clean");
        assert_eq!(cleaned, input);
    }

    #[test]
    fn file_entry_point_streams_records() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{}\n$$$$\n{}\n$$$$", CLEAN_RECORD, CLEAN_RECORD).expect("write sdf");

        let mut records = clean_sdf_file(file.path()).expect("file should open");
        let mut count = 0;
        while let Some(record) = records.next_record().expect("records should clean") {
            assert!(record.contains("M  END"));
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = clean_sdf_file("/no/such/file.sdf").expect_err("missing file should fail");
        match err {
            Error::Io { path, .. } => {
                assert!(path.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
