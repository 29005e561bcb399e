//! Splitting document text into synthesis lines.

/// One unit of text submitted to the synthesis engine.
///
/// `index` numbers the non-blank lines of a document consecutively and is
/// what the playback cursor and position events refer to. `source_line` is
/// the document line the text came from, for locating the block to
/// highlight in an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Position in the segmented sequence.
    pub index: usize,
    /// Zero-based line number in the original document.
    pub source_line: usize,
    /// Text passed verbatim to the engine.
    pub text: String,
}

/// Splits text into lines, dropping lines that are empty or whitespace only.
///
/// Both `\n` and `\r\n` line endings are accepted.
///
/// # Example
///
/// ```
/// use stream_speech::segment;
///
/// let lines = segment("A\n\nB");
/// assert_eq!(lines.len(), 2);
/// assert_eq!(lines[1].text, "B");
/// assert_eq!(lines[1].index, 1);
/// assert_eq!(lines[1].source_line, 2);
/// ```
pub fn segment(text: &str) -> Vec<Line> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .enumerate()
        .map(|(index, (source_line, line))| Line {
            index,
            source_line,
            text: line.to_string(),
        })
        .collect()
}

/// Maps an editor cursor position (document line) to a line index.
///
/// A cursor on a blank line starts at the next non-blank line. Returns
/// `lines.len()` when the cursor is past the last line.
pub fn index_for_source_line(lines: &[Line], source_line: usize) -> usize {
    lines.partition_point(|line| line.source_line < source_line)
}
