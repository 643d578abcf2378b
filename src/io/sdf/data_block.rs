/// Maximum payload characters carried by one `M  SCD`/`M  SED` output line.
const MAX_DATA_LINE: usize = 70;

/// Accumulates the free-text value of one data sgroup while its `M  SCD`
/// continuation lines stream by, until an `M  SED` line (or an interrupting
/// unrelated line) ends it.
///
/// On flush the collected text is right-trimmed and re-wrapped: full chunks go
/// out as `M  SCD` lines and the final chunk as the terminating `M  SED` line,
/// so a dangling run of continuations still ends with a proper terminator.
pub(crate) struct SgroupDataBlock {
    id: i32,
    text: String,
    terminated: bool,
}

impl SgroupDataBlock {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            text: String::new(),
            terminated: false,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Appends the payload of an `M  SCD` continuation line.
    pub fn push_continuation(&mut self, payload: &str) {
        self.text.push_str(payload);
    }

    /// Appends the payload of the terminating `M  SED` line.
    pub fn terminate(&mut self, payload: &str) {
        self.text.push_str(payload);
        self.terminated = true;
    }

    /// Re-wraps the merged text into fixed-width lines and appends them to the
    /// output buffer, each line followed by a newline.
    pub fn flush_into(self, buffer: &mut String) {
        let merged = self.text.trim_end();
        let chars: Vec<char> = merged.chars().collect();

        if chars.is_empty() {
            buffer.push_str(&format!("M  SED {:>3}\n", self.id));
            return;
        }

        let chunks: Vec<String> = chars
            .chunks(MAX_DATA_LINE)
            .map(|c| c.iter().collect())
            .collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let tag = if i == last { "SED" } else { "SCD" };
            buffer.push_str(&format!("M  {} {:>3} {}\n", tag, self.id, chunk));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_text_shorter_than_one_line_flushes_as_single_sed() {
        let mut block = SgroupDataBlock::new(5);
        block.push_continuation("part-one-");
        block.push_continuation("part-two-");
        block.terminate("end");

        let mut out = String::new();
        block.flush_into(&mut out);

        assert_eq!(out, "M  SED   5 part-one-part-two-end\n");
    }

    #[test]
    fn merged_text_is_right_trimmed_before_wrapping() {
        let mut block = SgroupDataBlock::new(2);
        block.push_continuation("value   ");
        block.terminate("   ");

        let mut out = String::new();
        block.flush_into(&mut out);

        assert_eq!(out, "M  SED   2 value\n");
    }

    #[test]
    fn long_text_wraps_into_scd_lines_with_final_sed() {
        let mut block = SgroupDataBlock::new(1);
        block.push_continuation(&"x".repeat(100));
        block.terminate("");

        let mut out = String::new();
        block.flush_into(&mut out);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("M  SCD   1 {}", "x".repeat(70)));
        assert_eq!(lines[1], format!("M  SED   1 {}", "x".repeat(30)));
    }

    #[test]
    fn dangling_continuation_still_flushes_with_a_terminator() {
        let mut block = SgroupDataBlock::new(7);
        block.push_continuation("unterminated");
        assert!(!block.is_terminated());

        let mut out = String::new();
        block.flush_into(&mut out);

        assert_eq!(out, "M  SED   7 unterminated\n");
    }

    #[test]
    fn empty_block_flushes_as_bare_sed() {
        let block = SgroupDataBlock::new(3);
        let mut out = String::new();
        block.flush_into(&mut out);

        assert_eq!(out, "M  SED   3\n");
    }
}
