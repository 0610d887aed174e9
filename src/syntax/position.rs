use ropey::Rope;

/// Byte offset of an LSP position (zero-based line, UTF-16 column). A line
/// past the end of the text or a column past the end of its line has no
/// offset.
pub fn offset_at(source: &str, line: u32, character: u32) -> Option<u32> {
    let rope = Rope::from_str(source);
    let line = line as usize;
    if line >= rope.len_lines() {
        return None;
    }
    let slice = rope.line(line);
    let content = slice.chars().take_while(|&c| c != '\n' && c != '\r').count();
    let character = character as usize;
    if character > slice.slice(..content).len_utf16_cu() {
        return None;
    }
    let column = slice.utf16_cu_to_char(character);
    let byte = rope.char_to_byte(rope.line_to_char(line) + column);
    u32::try_from(byte).ok()
}
