/// Rows in an OOXML or BIFF8 worksheet, at most.
pub(crate) const MAX_ROWS: usize = 1_048_576;
/// Columns in an OOXML or BIFF8 worksheet, at most (`XFD`).
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Converts an A1-style cell reference to a zero-based (row, col) pair.
/// Absolute markers (`$`) are ignored. References past `XFD1048576` are `None`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let mut col = 0usize;
    let mut row = 0usize;
    let mut has_col = false;
    let mut has_row = false;
    for character in reference.chars().filter(|character| *character != '$') {
        match character {
            'A'..='Z' | 'a'..='z' if !has_row => {
                let digit = character.to_ascii_uppercase() as usize - 'A' as usize + 1;
                col = col.checked_mul(26)?.checked_add(digit)?;
                has_col = true;
            }
            '0'..='9' if has_col => {
                row = row.checked_mul(10)?.checked_add(character as usize - '0' as usize)?;
                has_row = true;
            }
            _ => return None,
        }
    }
    if has_col && has_row && row > 0 && row <= MAX_ROWS && col <= MAX_COLUMNS {
        Some((row - 1, col - 1))
    } else {
        None
    }
}

/// Converts a zero-based (row, col) pair to an A1-style cell reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        let remainder = (col - 1) % 26;
        letters.push((b'A' + remainder as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_to_index() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("B3"), Some((2, 1)));
        assert_eq!(reference_to_index("$AA$10"), Some((9, 26)));
        assert_eq!(reference_to_index("A0"), None);
        assert_eq!(reference_to_index("1A"), None);
        assert_eq!(reference_to_index(""), None);
    }

    #[test]
    fn rejects_references_past_the_sheet_limits() {
        assert_eq!(reference_to_index("XFD1048576"), Some((MAX_ROWS - 1, MAX_COLUMNS - 1)));
        assert_eq!(reference_to_index("XFE1"), None);
        assert_eq!(reference_to_index("A1048577"), None);
        assert_eq!(reference_to_index("AAAAAAAAAAAA2"), None);
    }

    #[test]
    fn test_index_to_reference() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(9, 26), "AA10");
        assert_eq!(index_to_reference(0, 701), "ZZ1");
    }
}
