//! Offset-to-line side table.
//!
//! The table is a sequence of byte pairs `(offset_delta: u8, line_delta: i8)`
//! relative to a base of offset 0 and the unit's first line. A pair is only
//! written when the line changes. Deltas that do not fit are split:
//!
//! - offset deltas above 255 emit `(255, 0)` fillers first,
//! - line deltas above 127 (below -128) emit `(offset_delta, 127)` and then
//!   `(0, 127)` fillers (`-128` respectively), the remainder goes last.

/// Accumulates `(offset, line)` pairs during assembly.
#[derive(Debug, Clone)]
pub struct LineTableBuilder {
    buf: Vec<u8>,
    last_offset: usize,
    last_line: i64,
}

impl LineTableBuilder {
    pub fn new(first_line: u32) -> Self {
        Self {
            buf: Vec::new(),
            last_offset: 0,
            last_line: first_line as i64,
        }
    }

    /// Record that the instruction at `offset` belongs to `line`.
    ///
    /// Offsets must be non-decreasing. Nothing is written while the line
    /// stays the same.
    pub fn add(&mut self, offset: usize, line: u32) {
        let line = line as i64;
        if line == self.last_line {
            return;
        }

        let mut d_off = offset.saturating_sub(self.last_offset);
        let mut d_line = line - self.last_line;

        while d_off > 255 {
            self.push(255, 0);
            d_off -= 255;
        }
        while d_line > 127 {
            self.push(d_off as u8, 127);
            d_off = 0;
            d_line -= 127;
        }
        while d_line < -128 {
            self.push(d_off as u8, -128);
            d_off = 0;
            d_line += 128;
        }
        self.push(d_off as u8, d_line as i8);

        self.last_offset = offset;
        self.last_line = line;
    }

    fn push(&mut self, d_off: u8, d_line: i8) {
        self.buf.push(d_off);
        self.buf.push(d_line as u8);
    }

    pub fn finish(self) -> LineTable {
        LineTable { bytes: self.buf }
    }
}

/// An encoded offset-to-line table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LineTable {
    bytes: Vec<u8>,
}

impl LineTable {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw `(offset_delta, line_delta)` pairs. A trailing odd byte is
    /// ignored.
    pub fn entries(&self) -> impl Iterator<Item = (u8, i8)> + '_ {
        self.bytes.chunks_exact(2).map(|pair| (pair[0], pair[1] as i8))
    }

    /// Line of the instruction at or most recently before `offset`.
    pub fn line_for_offset(&self, first_line: u32, offset: usize) -> u32 {
        let mut addr = 0usize;
        let mut line = first_line as i64;
        for (d_off, d_line) in self.entries() {
            addr += d_off as usize;
            if addr > offset {
                break;
            }
            line += d_line as i64;
        }
        clamp_line(line)
    }

    /// Offsets at which a new source line starts, with that line.
    pub fn line_starts(&self, first_line: u32) -> Vec<(usize, u32)> {
        let mut starts = Vec::new();
        let mut last_line = None;
        let mut line = first_line as i64;
        let mut addr = 0usize;

        for (d_off, d_line) in self.entries() {
            if d_off != 0 {
                if last_line != Some(line) {
                    starts.push((addr, clamp_line(line)));
                    last_line = Some(line);
                }
                addr += d_off as usize;
            }
            line += d_line as i64;
        }
        if last_line != Some(line) {
            starts.push((addr, clamp_line(line)));
        }
        starts
    }
}

fn clamp_line(line: i64) -> u32 {
    u32::try_from(line.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(first_line: u32, pairs: &[(usize, u32)]) -> LineTable {
        let mut builder = LineTableBuilder::new(first_line);
        for &(offset, line) in pairs {
            builder.add(offset, line);
        }
        builder.finish()
    }

    #[test]
    fn empty_table() {
        let table = build(1, &[(0, 1), (3, 1)]);
        assert!(table.is_empty());
        assert_eq!(table.line_for_offset(1, 0), 1);
        assert_eq!(table.line_for_offset(1, 100), 1);
    }

    #[test]
    fn one_entry_per_line_change() {
        let table = build(1, &[(0, 1), (3, 2), (4, 2), (7, 4)]);
        assert_eq!(table.as_bytes(), &[3, 1, 4, 2]);
        assert_eq!(table.line_for_offset(1, 0), 1);
        assert_eq!(table.line_for_offset(1, 2), 1);
        assert_eq!(table.line_for_offset(1, 3), 2);
        assert_eq!(table.line_for_offset(1, 6), 2);
        assert_eq!(table.line_for_offset(1, 7), 4);
        assert_eq!(table.line_for_offset(1, 1000), 4);
    }

    #[test]
    fn large_offset_delta_is_split() {
        let table = build(1, &[(0, 1), (600, 2)]);
        assert_eq!(table.as_bytes(), &[255, 0, 255, 0, 90, 1]);
        assert_eq!(table.line_for_offset(1, 599), 1);
        assert_eq!(table.line_for_offset(1, 600), 2);
    }

    #[test]
    fn large_line_delta_is_split() {
        let table = build(1, &[(0, 1), (3, 301)]);
        assert_eq!(table.as_bytes(), &[3, 127, 0, 127, 0, 46]);
        assert_eq!(table.line_for_offset(1, 3), 301);
    }

    #[test]
    fn negative_line_delta() {
        let table = build(200, &[(0, 200), (3, 10)]);
        assert_eq!(table.entries().collect::<Vec<_>>(), vec![(3, -128), (0, -62)]);
        assert_eq!(table.line_for_offset(200, 3), 10);
        assert_eq!(table.line_for_offset(200, 2), 200);
    }

    #[test]
    fn line_starts_follow_changes() {
        let table = build(5, &[(0, 6), (3, 6), (4, 9)]);
        assert_eq!(table.line_starts(5), vec![(0, 6), (4, 9)]);

        let unchanged = build(5, &[(0, 5), (3, 5)]);
        assert_eq!(unchanged.line_starts(5), vec![(0, 5)]);
    }
}
