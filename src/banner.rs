//! Probe payload and response sampling.
//!
//! After a successful connect the prober writes one fixed, protocol-agnostic
//! request and keeps whatever the service answers with, up to
//! [`MAX_RESPONSE_SIZE`] bytes. The report only ever shows a short,
//! printable sample of that response.

/// Bytes sent to an open port to elicit a response.
pub const PROBE_PAYLOAD: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// Maximum bytes read back from an open port.
pub const MAX_RESPONSE_SIZE: usize = 1024;

/// Longest response sample written to a report line.
pub const SAMPLE_LEN: usize = 64;

/// Turn raw response bytes into a single-line printable sample.
///
/// Control bytes become `.`, line breaks and tabs become spaces, runs of
/// spaces collapse, and `|` is masked so the sample never splits a
/// pipe-delimited report field.
pub fn sanitize_response(data: &[u8], limit: usize) -> String {
    let s: String = data
        .iter()
        .take(limit)
        .map(|&b| match b {
            b'|' => '.',
            b'\r' | b'\n' | b'\t' => ' ',
            b if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => '.',
        })
        .collect();

    // Collapse multiple spaces and trim
    let mut result = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        if c == ' ' {
            if !prev_space {
                result.push(c);
            }
            prev_space = true;
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}
