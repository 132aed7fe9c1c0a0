//! Header block parsing.
//!
//! HAProxy's `req.hdrs` fetch delivers the request headers as plain text,
//! one `Key: Value` per line. Lines that do not split on the first `": "`
//! are skipped so one bad header never costs the whole mirrored request.

/// Parse a header block into `(name, value)` pairs, in input order.
///
/// Lines end in `\n` or `\r\n`. Empty lines are ignored, and malformed
/// lines are logged at debug level and skipped.
pub fn parse_header_block(block: &str) -> Vec<(&str, &str)> {
    let mut headers = Vec::new();

    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        match line.split_once(": ") {
            Some((name, value)) => headers.push((name, value)),
            None => {
                tracing::debug!(line = ?line, "Skipping malformed header line");
            }
        }
    }

    headers
}

/// Framing headers recomputed by the outbound client.
///
/// The body is sent whole and the URL carries the mirror host, so the
/// original values for these would be wrong or conflicting.
pub fn is_framing_header(name: &str) -> bool {
    const FRAMING: [&str; 4] = ["host", "content-length", "transfer-encoding", "trailer"];
    FRAMING.iter().any(|h| h.eq_ignore_ascii_case(name))
}
