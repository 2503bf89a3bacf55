use std::sync::atomic::{AtomicU64, Ordering};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Produce `{prefix}{16 hex digits}` from a process-wide counter.
pub(crate) fn next_generated_id(prefix: &str, counter: &AtomicU64) -> String {
    let id = counter.fetch_add(1, Ordering::Relaxed);
    format_request_seq_hex(prefix, id)
}

#[inline]
pub(crate) fn format_request_seq_hex(prefix: &str, request_seq: u64) -> String {
    let mut out = String::with_capacity(prefix.len() + 16);
    out.push_str(prefix);
    push_u64_hex_16(&mut out, request_seq);
    out
}

/// Payload of an upstream SSE line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SseData<'a> {
    Done,
    Json(&'a str),
}

/// Classify one upstream line. Only `data:` lines (one optional space after
/// the colon) carry a payload; everything else yields `None`.
#[inline]
pub(crate) fn extract_sse_data_payload(line: &str) -> Option<SseData<'_>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix("data:")?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest);
    if payload.trim() == "[DONE]" {
        return Some(SseData::Done);
    }
    Some(SseData::Json(payload))
}

/// Approximate token count: number of whitespace-separated pieces.
#[inline]
#[must_use]
pub(crate) fn whitespace_piece_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        let nibble = usize::try_from(value & 0x0f).unwrap_or(0);
        buf[idx] = HEX[nibble];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}
