use std::ops::Range;

/// Splits `input` into ranges of roughly `target` bytes. Each range ends one
/// past a newline, or at the end of input, so no line straddles two ranges.
pub fn split_chunks(input: &[u8], target: usize) -> Vec<Range<usize>> {
    let target = target.max(1);
    let mut ranges = Vec::with_capacity(input.len() / target + 1);
    let mut start = 0;
    while start < input.len() {
        let tentative = start.saturating_add(target);
        let end = if tentative >= input.len() {
            input.len()
        } else {
            // extend to the end of the line containing `tentative`
            memchr::memchr(b'\n', &input[tentative..])
                .map_or(input.len(), |nl| tentative + nl + 1)
        };
        ranges.push(start..end);
        start = end;
    }
    ranges
}

/// Lines of a chunk paired with their starting offset. A trailing newline
/// does not produce an empty final line.
pub fn lines(chunk: &[u8]) -> impl Iterator<Item = (usize, &[u8])> + '_ {
    let mut start = 0;
    let newlines = memchr::memchr_iter(b'\n', chunk).map(move |nl| {
        let line = (start, &chunk[start..nl]);
        start = nl + 1;
        line
    });
    let last_start = memchr::memrchr(b'\n', chunk).map_or(0, |nl| nl + 1);
    let tail = (last_start < chunk.len()).then(|| (last_start, &chunk[last_start..]));
    newlines.chain(tail)
}
