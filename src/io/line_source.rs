use crate::io::error::Error;
use std::io::BufRead;

/// A line-oriented reader with an explicit pushback buffer, so parsing code
/// can peek at or return the most recently read line.
///
/// The buffer is a small last-in-first-out stack: normal parsing keeps at most
/// one line pending, while the record-delimiter cleanup stages a header line
/// plus one synthetic blank line together.
#[derive(Debug)]
pub struct PushbackLineReader<R> {
    reader: R,
    pushed: Vec<String>,
    line_number: usize,
}

impl<R: BufRead> PushbackLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pushed: Vec::new(),
            line_number: 0,
        }
    }

    /// Returns the next line without its terminator, pending pushback first,
    /// or `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<String>, Error> {
        if let Some(line) = self.pushed.pop() {
            self.line_number += 1;
            return Ok(Some(line));
        }

        let mut buf = String::new();
        let read = self
            .reader
            .read_line(&mut buf)
            .map_err(|e| Error::from_io(e, None))?;
        if read == 0 {
            return Ok(None);
        }

        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        self.line_number += 1;
        Ok(Some(buf))
    }

    /// Returns the next line without consuming it.
    pub fn peek_line(&mut self) -> Result<Option<&str>, Error> {
        if self.pushed.is_empty() {
            match self.read_line()? {
                Some(line) => self.push_back(line),
                None => return Ok(None),
            }
        }
        Ok(self.pushed.last().map(|s| s.as_str()))
    }

    /// Makes `line` the next value returned by [`read_line`](Self::read_line).
    pub fn push_back(&mut self, line: String) {
        self.line_number = self.line_number.saturating_sub(1);
        self.pushed.push(line);
    }

    /// One-based number of the line most recently consumed.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}
