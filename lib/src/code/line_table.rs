use super::CodeUnit;

/// Iterator over the `(offset, line)` starts encoded in a code unit's line table
///
/// The table is a sequence of `(offset increment, line increment)` unsigned byte pairs. A line
/// start is only emitted when the line actually changes, and only once the offset has moved
/// past it (large line jumps get split across several pairs with a zero offset increment).
pub struct LineStarts<'a> {
    pairs: std::slice::ChunksExact<'a, u8>,
    offset: usize,
    line: u32,
    last_line: Option<u32>,
    done: bool,
}

impl<'a> LineStarts<'a> {
    pub fn new(line_table: &'a [u8], first_line: u32) -> LineStarts<'a> {
        LineStarts {
            pairs: line_table.chunks_exact(2),
            offset: 0,
            line: first_line,
            last_line: None,
            done: false,
        }
    }
}

impl<'a> Iterator for LineStarts<'a> {
    type Item = (usize, u32);

    fn next(&mut self) -> Option<(usize, u32)> {
        if self.done {
            return None;
        }

        for pair in self.pairs.by_ref() {
            let (offset_incr, line_incr) = (pair[0] as usize, pair[1] as u32);
            let mut start = None;
            if offset_incr != 0 {
                if self.last_line != Some(self.line) {
                    self.last_line = Some(self.line);
                    start = Some((self.offset, self.line));
                }
                self.offset += offset_incr;
            }
            self.line = self.line.saturating_add(line_incr);
            if start.is_some() {
                return start;
            }
        }

        self.done = true;
        if self.last_line != Some(self.line) {
            self.last_line = Some(self.line);
            Some((self.offset, self.line))
        } else {
            None
        }
    }
}

/// Line starts of a code unit
pub fn line_starts(unit: &CodeUnit) -> LineStarts<'_> {
    LineStarts::new(unit.line_table(), unit.first_line())
}
