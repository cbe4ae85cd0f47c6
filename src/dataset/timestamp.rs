use chrono::NaiveDateTime;

/// Format of the timestamp column in the source file.
pub const INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format the timestamp is stored in at the destination.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Strict parse of `"YYYY-MM-DD HH:MM"`.
pub fn parse_input(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // exact length + separators check, chrono alone accepts unpadded fields
    let b = s.as_bytes();
    if b.len() != 16 || b[4] != b'-' || b[7] != b'-' || b[10] != b' ' || b[13] != b':' {
        return None;
    }
    NaiveDateTime::parse_from_str(s, INPUT_FORMAT).ok()
}

/// Parse a stored `"YYYY-MM-DD HH:MM:SS"` value.
pub fn parse_canonical(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), CANONICAL_FORMAT).ok()
}

pub fn to_canonical(ts: &NaiveDateTime) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}
