//! The record state machine behind the cleaner: a fixed sequence of states,
//! each consuming lines from a [`PushbackLineReader`], applying one repair
//! policy, appending corrected text to the output buffer, and naming the next
//! state.
//!
//! Repairs applied along the way include restoring dropped header lines,
//! rewriting the counts line with canonical column widths, re-deriving the
//! left-padding of atom and bond lines, re-chunking over-long `M  CHG`,
//! `M  STY`, `M  SAL`, and `M  SDS EXP` lists, discarding sgroup lines that
//! reference undeclared or invalid groups, re-wrapping `M  SCD`/`M  SED` data
//! blocks, normalizing the `M  END` terminator, and collapsing stray blank
//! lines around the `$$$$` record delimiter.

use crate::io::error::Error;
use crate::io::line_source::PushbackLineReader;
use crate::io::sdf::data_block::SgroupDataBlock;
use crate::model::types::{CtabVersion, SgroupType};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::str::FromStr;

pub(crate) const FORMAT: &str = "SDF";

/// Counts learned on the counts line and consumed by the atom and bond block
/// states of the same record.
#[derive(Debug, Default)]
pub(crate) struct ParseFacts {
    pub atom_count: usize,
    pub bond_count: usize,
    pub version: CtabVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadState {
    Begin,
    Header,
    CountsLine,
    AtomList,
    BondList,
    ConnectionTable,
    V3000ConnectionTable,
    BeforeDataItems,
    DataItems,
    Delimiter,
    Eof,
}

impl ReadState {
    /// Reads potentially multiple lines, cleans them, appends the cleaned text
    /// to `buffer`, and returns the next state.
    pub fn read_clean<R: BufRead>(
        self,
        reader: &mut PushbackLineReader<R>,
        buffer: &mut String,
        facts: &mut ParseFacts,
    ) -> Result<ReadState, Error> {
        match self {
            ReadState::Begin => read_begin(reader),
            ReadState::Header => read_header(reader, buffer),
            ReadState::CountsLine => read_counts_line(reader, buffer, facts),
            ReadState::AtomList => read_atom_list(reader, buffer, facts),
            ReadState::BondList => read_bond_list(reader, buffer, facts),
            ReadState::ConnectionTable => read_connection_table(reader, buffer),
            ReadState::V3000ConnectionTable => read_v3000_connection_table(reader, buffer),
            ReadState::BeforeDataItems => read_before_data_items(reader),
            ReadState::DataItems => read_data_items(reader, buffer),
            ReadState::Delimiter => read_delimiter(reader),
            ReadState::Eof => Ok(ReadState::Eof),
        }
    }
}

fn read_begin<R: BufRead>(reader: &mut PushbackLineReader<R>) -> Result<ReadState, Error> {
    Ok(if reader.peek_line()?.is_none() {
        ReadState::Eof
    } else {
        ReadState::Header
    })
}

/// Reads the up-to-4-line header, stopping at the line carrying the version
/// marker, which is pushed back for the counts-line state to reformat.
///
/// A header missing one of its optional lines (the often-blank title or the
/// comment) is repaired by inserting a blank line where the blank/non-blank
/// pattern of the surviving lines says it belongs.
fn read_header<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
) -> Result<ReadState, Error> {
    let mut preceding: Vec<String> = Vec::with_capacity(4);
    let mut counts_line: Option<String> = None;

    while preceding.len() < 4 {
        let Some(line) = reader.read_line()? else {
            return Err(Error::truncated(
                FORMAT,
                None,
                format!("header ended after {} line(s)", preceding.len()),
            ));
        };
        if line.contains("V2000") || line.contains("V3000") {
            counts_line = Some(line);
            break;
        }
        preceding.push(line);
    }

    let counts = match counts_line {
        Some(counts) => {
            match preceding.len() {
                3 => {}
                2 => repair_short_header(&mut preceding)?,
                n => {
                    return Err(Error::parse(
                        FORMAT,
                        None,
                        reader.line_number(),
                        format!("header has only {} line(s) before the version marker", n),
                    ));
                }
            }
            counts
        }
        // no version marker within four lines; take the fourth as the counts
        // line and let the counts state decide whether it parses
        None => match preceding.pop() {
            Some(last) => last,
            None => {
                return Err(Error::truncated(FORMAT, None, "header ended before any line"));
            }
        },
    };

    for line in &preceding {
        buffer.push_str(line);
        buffer.push('\n');
    }
    reader.push_back(counts);
    Ok(ReadState::CountsLine)
}

fn repair_short_header(lines: &mut Vec<String>) -> Result<(), Error> {
    let first_blank = lines[0].trim().is_empty();
    let second_blank = lines[1].trim().is_empty();

    if !first_blank && second_blank {
        // the leading title line was dropped, a frequent copy-and-paste casualty
        lines.insert(0, String::new());
    } else if first_blank && !second_blank {
        // the comment line was dropped
        lines.push(String::new());
    } else if !first_blank && !second_blank {
        // both surviving lines carry text; internal whitespace marks the first
        // as the program line, a single token reads as a title
        if lines[0].trim().split_whitespace().count() >= 2 {
            lines.insert(0, String::new());
        } else {
            lines.push(String::new());
        }
    } else {
        return Err(Error::ambiguous_header(
            FORMAT,
            "two blank lines before the version marker",
        ));
    }
    Ok(())
}

/// Rewrites the counts line with canonical 3-column field widths, forcing the
/// obsolete fourth field to zero, and records the declared atom and bond
/// counts for the block states that follow.
///
/// A `V3000` marker routes to the V3000 connection-table policy instead; its
/// counts line is passed through untouched because the real counts live on the
/// `M  V30 COUNTS` line.
fn read_counts_line<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
    facts: &mut ParseFacts,
) -> Result<ReadState, Error> {
    let Some(line) = reader.read_line()? else {
        return Err(Error::truncated(FORMAT, None, "input ended before the counts line"));
    };

    if line.contains("V3000") {
        facts.version = CtabVersion::V3000;
        buffer.push_str(&line);
        buffer.push('\n');
        return Ok(ReadState::V3000ConnectionTable);
    }

    let fields = parse_counts_fields(&line).ok_or_else(|| {
        Error::parse(
            FORMAT,
            None,
            reader.line_number(),
            format!("counts line fields are not integers: '{}'", line.trim_end()),
        )
    })?;

    facts.version = CtabVersion::V2000;
    facts.atom_count = fields[0].max(0) as usize;
    facts.bond_count = fields[1].max(0) as usize;

    buffer.push_str(&format!(
        "{:>3}{:>3}{:>3}{:>3}{:>3}{:>3}{:>3}{:>3}{:>3}{:>3}{:>3} V2000\n",
        fields[0],
        fields[1],
        fields[2],
        0,
        fields[4],
        fields[5],
        fields[6],
        fields[7],
        fields[8],
        fields[9],
        fields[10],
    ));
    Ok(ReadState::AtomList)
}

fn parse_counts_fields(line: &str) -> Option<[i32; 11]> {
    column_counts_fields(line).or_else(|| token_counts_fields(line))
}

/// Strict fixed-column parse; only accepted when the version field sits at its
/// canonical position, which rejects lines shifted by lost whitespace.
fn column_counts_fields(line: &str) -> Option<[i32; 11]> {
    if line.get(33..39)? != " V2000" {
        return None;
    }
    let mut fields = [0i32; 11];
    for (i, field) in fields.iter_mut().enumerate() {
        let span = line.get(i * 3..i * 3 + 3)?.trim();
        if !span.is_empty() {
            *field = span.parse().ok()?;
        }
    }
    Some(fields)
}

/// Whitespace-token fallback for misaligned counts lines. Missing middle
/// fields read as zero; the token adjacent to the version marker is taken as
/// the properties count, which otherwise defaults to 999.
fn token_counts_fields(line: &str) -> Option<[i32; 11]> {
    let numeric = match line.find("V2000") {
        Some(idx) => &line[..idx],
        None => line,
    };

    let mut values: Vec<i32> = Vec::new();
    for token in numeric.split_whitespace() {
        values.push(token.parse().ok()?);
    }
    if values.len() < 2 {
        return None;
    }

    let mut fields = [0i32; 11];
    fields[0] = values[0];
    fields[1] = values[1];
    fields[10] = 999;
    if values.len() >= 11 {
        fields[2..11].copy_from_slice(&values[2..11]);
    } else if values.len() >= 3 {
        fields[10] = values[values.len() - 1];
        for (slot, value) in fields[2..10].iter_mut().zip(&values[2..values.len() - 1]) {
            *slot = *value;
        }
    }
    Some(fields)
}

/// Consumes exactly the declared number of atom lines, re-padding the integer
/// portion of the first coordinate so lines stripped of their leading
/// whitespace line up again.
fn read_atom_list<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
    facts: &ParseFacts,
) -> Result<ReadState, Error> {
    for read in 0..facts.atom_count {
        let Some(line) = reader.read_line()? else {
            return Err(Error::truncated(
                FORMAT,
                None,
                format!("atom block ended after {} of {} line(s)", read, facts.atom_count),
            ));
        };
        buffer.push_str(&realign_atom_line(&line));
        buffer.push('\n');
    }
    Ok(ReadState::BondList)
}

fn realign_atom_line(line: &str) -> String {
    match line.find('.') {
        Some(dot) => format!("{:>5}{}", line[..dot].trim(), &line[dot..]),
        None => line.to_string(),
    }
}

/// Consumes exactly the declared number of bond lines, re-deriving the left
/// padding of the atom-index columns from the width of the leading digit run.
fn read_bond_list<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
    facts: &ParseFacts,
) -> Result<ReadState, Error> {
    for read in 0..facts.bond_count {
        let Some(line) = reader.read_line()? else {
            return Err(Error::truncated(
                FORMAT,
                None,
                format!("bond block ended after {} of {} line(s)", read, facts.bond_count),
            ));
        };
        buffer.push_str(&realign_bond_line(&line));
        buffer.push('\n');
    }
    Ok(ReadState::ConnectionTable)
}

fn realign_bond_line(line: &str) -> String {
    let stripped = line.trim_start();
    let digits = stripped.chars().take_while(char::is_ascii_digit).count();
    // 1-3 digits are the first index alone; 4-6 mean the two index fields fused
    let padding = match digits {
        1..=3 => 3 - digits,
        4..=6 => 6 - digits,
        _ => return line.to_string(),
    };
    format!("{}{}", " ".repeat(padding), stripped)
}

/// Cleans the property block of a V2000 record up to its `M  END` terminator.
///
/// Charge, sgroup-declaration, sgroup-member, and expansion lines each get
/// their own policy; anything else passes through unchanged. Reaching end of
/// input before the terminator is a structural error.
fn read_connection_table<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
) -> Result<ReadState, Error> {
    let mut known_sgroups: BTreeMap<i32, SgroupType> = BTreeMap::new();
    let mut data_block: Option<SgroupDataBlock> = None;

    loop {
        let Some(line) = reader.read_line()? else {
            return Err(Error::truncated(FORMAT, None, "connection table ended before M  END"));
        };
        let line_number = reader.line_number();

        match property_code(&line) {
            Some(code) if code.starts_with("END") => {
                flush_data_block(&mut data_block, buffer);
                // two spaces, and anything trailing on the line is dropped
                buffer.push_str("M  END");
                if reader.peek_line()?.is_some() {
                    buffer.push('\n');
                }
                return Ok(ReadState::BeforeDataItems);
            }
            Some("CHG") => {
                flush_data_block(&mut data_block, buffer);
                clean_charge_line(&line, line_number, buffer)?;
            }
            Some("STY") => {
                flush_data_block(&mut data_block, buffer);
                clean_sgroup_declarations(&line, line_number, &mut known_sgroups, buffer)?;
            }
            Some("SDS") => {
                flush_data_block(&mut data_block, buffer);
                clean_sgroup_expansion(&line, line_number, buffer)?;
            }
            Some(code) if is_sgroup_member_code(code) => {
                clean_sgroup_member_line(
                    &line,
                    code,
                    line_number,
                    &known_sgroups,
                    &mut data_block,
                    buffer,
                )?;
            }
            _ => {
                flush_data_block(&mut data_block, buffer);
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }
    }
}

/// Best-effort V3000 policy: `M  V30` lines get their prefix normalized and
/// are otherwise passed through, until the `M  END` terminator.
fn read_v3000_connection_table<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
) -> Result<ReadState, Error> {
    loop {
        let Some(line) = reader.read_line()? else {
            return Err(Error::truncated(FORMAT, None, "connection table ended before M  END"));
        };

        match property_code(&line) {
            Some(code) if code.starts_with("END") => {
                buffer.push_str("M  END");
                if reader.peek_line()?.is_some() {
                    buffer.push('\n');
                }
                return Ok(ReadState::BeforeDataItems);
            }
            Some("V30") => {
                buffer.push_str(&normalize_v30_line(&line));
                buffer.push('\n');
            }
            _ => {
                buffer.push_str(&line);
                buffer.push('\n');
            }
        }
    }
}

fn normalize_v30_line(line: &str) -> String {
    let Some((_, rest)) = next_token(line) else {
        return line.to_string();
    };
    let Some((_, rest)) = next_token(rest) else {
        return line.to_string();
    };
    format!("M  V30 {}", rest.trim_start())
}

/// Discards blank lines between the connection table and the data items; the
/// format allows at most one and all of them collapse to none.
fn read_before_data_items<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
) -> Result<ReadState, Error> {
    loop {
        match reader.read_line()? {
            None => return Ok(ReadState::Eof),
            Some(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                reader.push_back(line);
                return Ok(ReadState::DataItems);
            }
        }
    }
}

/// Copies the data items through unchanged up to the `$$$$` delimiter; the
/// newline after the delimiter is suppressed when nothing follows it. End of
/// input without a delimiter is a valid bare single-record ending.
fn read_data_items<R: BufRead>(
    reader: &mut PushbackLineReader<R>,
    buffer: &mut String,
) -> Result<ReadState, Error> {
    loop {
        match reader.read_line()? {
            None => return Ok(ReadState::Eof),
            Some(line) => {
                buffer.push_str(&line);
                if line.starts_with("$$$$") {
                    if reader.peek_line()?.is_some() {
                        buffer.push('\n');
                    }
                    return Ok(ReadState::Delimiter);
                }
                buffer.push('\n');
            }
        }
    }
}

/// Consumes the run of blank lines after `$$$$`. The first non-blank line is
/// pushed back for the next header, preceded by one synthetic blank line when
/// any blanks were absorbed, restoring the single optional leading blank.
fn read_delimiter<R: BufRead>(reader: &mut PushbackLineReader<R>) -> Result<ReadState, Error> {
    let mut blank_lines = 0usize;
    loop {
        match reader.read_line()? {
            None => return Ok(ReadState::Eof),
            Some(line) => {
                if line.trim().is_empty() {
                    blank_lines += 1;
                    continue;
                }
                reader.push_back(line);
                if blank_lines != 0 {
                    reader.push_back(String::new());
                }
                return Ok(ReadState::Header);
            }
        }
    }
}

/// Re-chunks an `M  CHG` line to at most 8 charge pairs per output line.
fn clean_charge_line(line: &str, line_number: usize, buffer: &mut String) -> Result<(), Error> {
    let mut fields = Fields::after_code(line, line_number);
    let declared = fields.next_int("charge count")?;

    let mut pairs = Vec::with_capacity(declared.max(0) as usize);
    for _ in 0..declared {
        let atom = fields.next_int("charge atom index")?;
        let charge = fields.next_int("charge value")?;
        pairs.push((atom, charge));
    }

    if pairs.len() <= 8 {
        buffer.push_str(line);
        buffer.push('\n');
        return Ok(());
    }
    for chunk in pairs.chunks(8) {
        let mut out = format!("M  CHG{:>3}", chunk.len());
        for (atom, charge) in chunk {
            out.push_str(&format!(" {:>3} {:>3}", atom, charge));
        }
        out.push('\n');
        buffer.push_str(&out);
    }
    Ok(())
}

/// Validates an `M  STY` declaration line against the known type codes.
///
/// Pairs with an unknown type are dropped, already-declared ids are not
/// redeclared, and only the surviving newly-declared pairs are written out,
/// at most 8 per line.
fn clean_sgroup_declarations(
    line: &str,
    line_number: usize,
    known_sgroups: &mut BTreeMap<i32, SgroupType>,
    buffer: &mut String,
) -> Result<(), Error> {
    let mut fields = Fields::after_code(line, line_number);
    let declared = fields.next_int("sgroup count")?;

    let mut fresh: Vec<(i32, SgroupType)> = Vec::new();
    for _ in 0..declared {
        let id = fields.next_int("sgroup id")?;
        let code = fields.next_word("sgroup type")?;
        let Ok(sgroup_type) = SgroupType::from_str(code) else {
            continue;
        };
        if known_sgroups.contains_key(&id) {
            continue;
        }
        known_sgroups.insert(id, sgroup_type);
        fresh.push((id, sgroup_type));
    }

    for chunk in fresh.chunks(8) {
        let mut out = format!("M  STY{:>3}", chunk.len());
        for (id, sgroup_type) in chunk {
            out.push_str(&format!(" {:>3} {:>3}", id, sgroup_type.as_code()));
        }
        out.push('\n');
        buffer.push_str(&out);
    }
    Ok(())
}

/// Re-chunks an `M  SDS EXP` expansion list to at most 15 entries per line;
/// an `SDS` line that is not an expansion passes through unchanged.
fn clean_sgroup_expansion(line: &str, line_number: usize, buffer: &mut String) -> Result<(), Error> {
    let mut fields = Fields::after_code(line, line_number);
    let keyword = fields.next_word("expansion keyword")?;

    // the count may fuse with the keyword once it reaches three digits
    let count = if keyword == "EXP" {
        fields.next_int("expansion count")?
    } else if let Some(count) = keyword.strip_prefix("EXP").and_then(|n| n.parse().ok()) {
        count
    } else {
        buffer.push_str(line);
        buffer.push('\n');
        return Ok(());
    };

    let mut values = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        values.push(fields.next_int("expansion value")?);
    }

    for chunk in values.chunks(15) {
        let mut out = format!("M  SDS EXP{:>3}", chunk.len());
        for value in chunk {
            out.push_str(&format!(" {:>3}", value));
        }
        out.push('\n');
        buffer.push_str(&out);
    }
    Ok(())
}

/// Applies the member-line policy for an `M  Sxx` line keyed by a group id:
/// dropped when the id was never validly declared or the line is structurally
/// wrong for the group's type, `SAL` lists re-chunked, `SCD`/`SED` routed to
/// the data accumulator, everything else passed through.
fn clean_sgroup_member_line(
    line: &str,
    code: &str,
    line_number: usize,
    known_sgroups: &BTreeMap<i32, SgroupType>,
    data_block: &mut Option<SgroupDataBlock>,
    buffer: &mut String,
) -> Result<(), Error> {
    let mut fields = Fields::after_code(line, line_number);
    let id = fields.next_int("sgroup id")?;

    let continues_live_block = matches!(code, "SCD" | "SED")
        && data_block.as_ref().map_or(false, |block| block.id() == id);
    if !continues_live_block {
        flush_data_block(data_block, buffer);
    }

    let Some(group_type) = known_sgroups.get(&id).copied() else {
        return Ok(());
    };
    if code == "SPA" && !group_type.allows_parent_atoms() {
        return Ok(());
    }

    match code {
        "SAL" => clean_sgroup_atom_list(id, fields, buffer),
        "SCD" | "SED" => {
            let payload = data_payload(fields.remainder());
            let block = data_block.get_or_insert_with(|| SgroupDataBlock::new(id));
            if code == "SED" {
                block.terminate(payload);
            } else {
                block.push_continuation(payload);
            }
            if block.is_terminated() {
                flush_data_block(data_block, buffer);
            }
            Ok(())
        }
        _ => {
            buffer.push_str(line);
            buffer.push('\n');
            Ok(())
        }
    }
}

/// Re-chunks an `M  SAL` atom list to at most 15 indices per line, discarding
/// non-positive indices.
fn clean_sgroup_atom_list(id: i32, mut fields: Fields<'_>, buffer: &mut String) -> Result<(), Error> {
    let declared = fields.next_int("atom count")?;

    let mut atoms = Vec::with_capacity(declared.max(0) as usize);
    for _ in 0..declared {
        let atom = fields.next_int("atom index")?;
        if atom >= 1 {
            atoms.push(atom);
        }
    }

    for chunk in atoms.chunks(15) {
        let mut out = format!("M  SAL {:>3} {:>2}", id, chunk.len());
        for atom in chunk {
            out.push_str(&format!(" {:>3}", atom));
        }
        out.push('\n');
        buffer.push_str(&out);
    }
    Ok(())
}

fn flush_data_block(data_block: &mut Option<SgroupDataBlock>, buffer: &mut String) {
    if let Some(block) = data_block.take() {
        block.flush_into(buffer);
    }
}

/// The payload of a data line is everything after the id field, minus the one
/// separating space; any further spacing belongs to the data itself.
fn data_payload(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest)
}

/// Returns the property code of an `M  xxx` line, tolerating sloppy spacing.
fn property_code(line: &str) -> Option<&str> {
    let (first, rest) = next_token(line)?;
    if first != "M" {
        return None;
    }
    let (code, _) = next_token(rest)?;
    Some(code)
}

fn is_sgroup_member_code(code: &str) -> bool {
    code.len() == 3 && code.starts_with('S')
}

fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// Whitespace-delimited field cursor over one property line, positioned after
/// the `M` tag and the three-letter code.
struct Fields<'a> {
    rest: &'a str,
    line_number: usize,
}

impl<'a> Fields<'a> {
    fn after_code(line: &'a str, line_number: usize) -> Self {
        let rest = match next_token(line).and_then(|(_, rest)| next_token(rest)) {
            Some((_, rest)) => rest,
            None => "",
        };
        Self { rest, line_number }
    }

    fn next_word(&mut self, what: &str) -> Result<&'a str, Error> {
        let (token, rest) = next_token(self.rest).ok_or_else(|| {
            Error::parse(FORMAT, None, self.line_number, format!("missing {}", what))
        })?;
        self.rest = rest;
        Ok(token)
    }

    fn next_int(&mut self, what: &str) -> Result<i32, Error> {
        let token = self.next_word(what)?;
        token.parse().map_err(|_| {
            Error::parse(
                FORMAT,
                None,
                self.line_number,
                format!("invalid {} '{}'", what, token),
            )
        })
    }

    fn remainder(&self) -> &'a str {
        self.rest
    }
}
