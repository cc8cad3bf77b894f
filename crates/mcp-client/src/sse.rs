//! Minimal SSE framing for streamed MCP replies.

/// Extract complete `data:` payloads from an SSE byte buffer.
///
/// Events are delimited by a blank line. Multi-line `data:` fields within
/// one event are joined with `\n`. `event:`, `id:` and `retry:` lines are
/// ignored.
///
/// The buffer holds raw bytes so a multi-byte character split across
/// network chunks stays intact; only complete events are decoded. Consumed
/// bytes are removed and any trailing partial event remains for the next
/// call.
pub(crate) fn drain_data_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    if buffer.contains(&b'\r') {
        *buffer = normalize_crlf(buffer);
    }

    let mut payloads = Vec::new();

    while let Some(pos) = find_blank_line(buffer) {
        let block: Vec<u8> = buffer.drain(..pos).collect();
        buffer.drain(..2);

        let block = String::from_utf8_lossy(&block);
        let data: Vec<&str> = block
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|d| d.strip_prefix(' ').unwrap_or(d))
            .collect();
        if data.is_empty() {
            continue;
        }
        let joined = data.join("\n");
        if !joined.trim().is_empty() {
            payloads.push(joined);
        }
    }

    payloads
}

fn find_blank_line(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Rewrite `\r\n` to `\n`. A lone trailing `\r` is kept; its `\n` may
/// still be in flight.
fn normalize_crlf(buffer: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.len());
    let mut i = 0;
    while i < buffer.len() {
        if buffer[i] == b'\r' && buffer.get(i + 1) == Some(&b'\n') {
            i += 1;
            continue;
        }
        out.push(buffer[i]);
        i += 1;
    }
    out
}
