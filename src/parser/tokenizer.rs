//! Zero-allocation tab tokenizer
//!
//! Delimiter positions go into a caller-owned fixed-size buffer, normally a
//! stack array inside [`FieldTable`]. The buffer never grows: when a line has
//! more tabs than the buffer holds, the text after the last recorded tab is
//! not addressable. Lines with more columns than
//! [`MAX_FIELDS`](super::fields::MAX_FIELDS) lose their tail columns rather
//! than costing an allocation.

use super::decoder::field_slice;

/// Field separator used by the tool's `-E separator=/t` output
pub const DELIMITER: u8 = b'\t';

/// Record the byte offset of every tab in `line` into `positions`
///
/// Returns how many offsets were written, which is at most `positions.len()`.
/// Field contents are not inspected.
pub fn find_delimiters(line: &str, positions: &mut [usize]) -> usize {
    let capacity = positions.len();
    if capacity == 0 {
        return 0;
    }

    let mut count = 0;
    for (offset, &byte) in line.as_bytes().iter().enumerate() {
        if byte == DELIMITER {
            positions[count] = offset;
            count += 1;
            if count == capacity {
                break;
            }
        }
    }
    count
}

/// Whether `line` has another tab after byte offset `after`
fn has_delimiter_after(line: &str, after: Option<usize>) -> bool {
    let start = after.map_or(0, |pos| pos + 1);
    line.as_bytes()
        .get(start..)
        .is_some_and(|rest| rest.contains(&DELIMITER))
}

/// A tokenized line: the line itself plus a stack-resident delimiter table
#[derive(Debug, Clone, Copy)]
pub struct FieldTable<'a, const N: usize> {
    line: &'a str,
    positions: [usize; N],
    count: usize,
    overflowed: bool,
}

impl<'a, const N: usize> FieldTable<'a, N> {
    /// Tokenize `line`
    pub fn new(line: &'a str) -> Self {
        let mut positions = [0usize; N];
        let count = find_delimiters(line, &mut positions);
        let last = count.checked_sub(1).map(|i| positions[i]);
        let overflowed = count == N && has_delimiter_after(line, last);
        Self {
            line,
            positions,
            count,
            overflowed,
        }
    }

    /// Number of delimiters captured
    pub fn delimiter_count(&self) -> usize {
        self.count
    }

    /// Whether the line had more tabs than the buffer could record
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Number of addressable fields
    pub fn field_count(&self) -> usize {
        if self.overflowed {
            self.count
        } else {
            self.count + 1
        }
    }

    /// Whether column `index` exists on this line (it may still be empty)
    pub fn has_field(&self, index: usize) -> bool {
        index < self.field_count()
    }

    /// Zero-copy view of column `index`, empty if absent
    pub fn field(&self, index: usize) -> &'a str {
        field_slice(self.line, &self.positions[..self.count], index, self.overflowed)
    }

    pub fn line(&self) -> &'a str {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_delimiters() {
        let mut positions = [0usize; 8];
        let count = find_delimiters("a\tbb\t\tc", &mut positions);
        assert_eq!(count, 3);
        assert_eq!(&positions[..3], &[1, 4, 5]);
    }

    #[test]
    fn test_no_delimiters() {
        let mut positions = [0usize; 4];
        assert_eq!(find_delimiters("single", &mut positions), 0);
        assert_eq!(find_delimiters("", &mut positions), 0);
    }

    #[test]
    fn test_count_capped_at_capacity() {
        let mut positions = [0usize; 2];
        let count = find_delimiters("a\tb\tc\td\te", &mut positions);
        assert_eq!(count, 2);
        assert_eq!(positions, [1, 3]);

        let mut empty: [usize; 0] = [];
        assert_eq!(find_delimiters("a\tb", &mut empty), 0);
    }

    #[test]
    fn test_field_table_access() {
        let table = FieldTable::<8>::new("1\t\tthree\t");
        assert_eq!(table.delimiter_count(), 3);
        assert_eq!(table.field_count(), 4);
        assert_eq!(table.field(0), "1");
        assert_eq!(table.field(1), "");
        assert_eq!(table.field(2), "three");
        assert_eq!(table.field(3), "");
        assert!(!table.has_field(4));
        assert_eq!(table.field(4), "");
    }

    #[test]
    fn test_full_buffer_keeps_last_field() {
        let table = FieldTable::<2>::new("a\tb\tc");
        assert_eq!(table.delimiter_count(), 2);
        assert!(!table.is_overflowed());
        assert_eq!(table.field_count(), 3);
        assert_eq!(table.field(1), "b");
        assert_eq!(table.field(2), "c");

        let trailing_empty = FieldTable::<1>::new("a\t");
        assert!(!trailing_empty.is_overflowed());
        assert!(trailing_empty.has_field(1));
        assert_eq!(trailing_empty.field(1), "");

        let no_tabs = FieldTable::<0>::new("only");
        assert!(!no_tabs.is_overflowed());
        assert_eq!(no_tabs.field(0), "only");
    }

    #[test]
    fn test_overflowed_table_hides_tail() {
        let table = FieldTable::<2>::new("a\tb\tc\td");
        assert_eq!(table.delimiter_count(), 2);
        assert!(table.is_overflowed());
        assert_eq!(table.field_count(), 2);
        assert_eq!(table.field(0), "a");
        assert_eq!(table.field(1), "b");
        // Everything after the second tab is out of reach
        assert_eq!(table.field(2), "");
        assert_eq!(table.field(3), "");
    }

    #[test]
    fn test_multibyte_fields() {
        let table = FieldTable::<4>::new("Ünïcode\t日本");
        assert_eq!(table.field(0), "Ünïcode");
        assert_eq!(table.field(1), "日本");
    }
}
