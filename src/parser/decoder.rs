//! Field decoding: raw column slices to typed values
//!
//! Every helper here is total: bad input yields `None` (or a documented
//! default), never a panic. Whether `None` is fatal is the caller's decision.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

/// Nanoseconds per timestamp tick; sub-tick precision is rounded away
const NANOS_PER_TICK: u32 = 100;
const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Extract column `index` given the delimiter offsets found on `line`
///
/// Returns an empty slice when the column is absent, empty, or the offsets
/// do not describe a valid range. With `overflowed` set, the text after the
/// last offset is treated as unreachable.
pub fn field_slice<'a>(
    line: &'a str,
    positions: &[usize],
    index: usize,
    overflowed: bool,
) -> &'a str {
    let start = match index {
        0 => 0,
        i => match positions.get(i - 1) {
            Some(&pos) => pos + 1,
            None => return "",
        },
    };

    let end = match positions.get(index) {
        Some(&pos) => pos,
        None if index == positions.len() && !overflowed => line.len(),
        None => return "",
    };

    if start >= end || end > line.len() {
        return "";
    }
    line.get(start..end).unwrap_or("")
}

/// First value of a multi-occurrence column (`"443,8443"` -> `"443"`)
///
/// The tool joins repeated fields with commas, e.g. for tunnelled packets.
pub fn first_value(value: &str) -> &str {
    match value.find(',') {
        Some(pos) => &value[..pos],
        None => value,
    }
}

pub fn parse_u32(value: &str) -> Option<u32> {
    first_value(value).trim().parse().ok()
}

pub fn parse_u16(value: &str) -> Option<u16> {
    first_value(value).trim().parse().ok()
}

pub fn parse_u8(value: &str) -> Option<u8> {
    first_value(value).trim().parse().ok()
}

/// Parse hex text such as `0x0018` or `18`
pub fn parse_hex_u16(value: &str) -> Option<u16> {
    let value = first_value(value).trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|v| u16::try_from(v).ok())
}

/// TCP flags column; absent or malformed yields 0
pub fn decode_tcp_flags(value: &str) -> u16 {
    parse_hex_u16(value).unwrap_or(0)
}

/// Boolean columns are `1`/`0` on current tool versions, `True`/`False` on older ones
pub fn parse_flag(value: &str) -> Option<bool> {
    match first_value(value).trim() {
        "1" | "True" | "true" | "Set" => Some(true),
        "0" | "False" | "false" | "Not set" => Some(false),
        _ => None,
    }
}

/// Parse fractional seconds since the Unix epoch, e.g. `1700000000.500000000`
///
/// Whole and fractional parts are parsed separately so no precision is lost
/// to floating point; nanoseconds are then rounded to the nearest 100 ns tick.
pub fn parse_epoch_timestamp(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if value.starts_with('-') {
        return None;
    }

    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    let mut seconds: i64 = whole.parse().ok()?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut nanos: u32 = 0;
    let mut scale = NANOS_PER_SECOND / 10;
    for digit in fraction.bytes().take(9) {
        nanos += u32::from(digit - b'0') * scale;
        scale /= 10;
    }

    let mut rounded = (nanos + NANOS_PER_TICK / 2) / NANOS_PER_TICK * NANOS_PER_TICK;
    if rounded >= NANOS_PER_SECOND {
        seconds = seconds.checked_add(1)?;
        rounded -= NANOS_PER_SECOND;
    }

    DateTime::<Utc>::from_timestamp(seconds, rounded).map(|dt| dt.with_timezone(&Local))
}

/// Parse the tool's human-readable time column
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS.f` (local), and the classic
/// `Nov 14, 2023 22:13:20.500000000 CET` form. Zone names other than `UTC`
/// are taken to mean local time, which is what the tool prints them in.
pub fn parse_formatted_timestamp(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Local.from_local_datetime(&naive).earliest();
    }

    let mut parts = value.split_whitespace();
    let head: Vec<&str> = parts.by_ref().take(4).collect();
    if head.len() < 4 {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(&head.join(" "), "%b %d, %Y %H:%M:%S%.f").ok()?;
    match parts.next() {
        Some("UTC") | Some("GMT") => Some(Utc.from_utc_datetime(&naive).with_timezone(&Local)),
        _ => Local.from_local_datetime(&naive).earliest(),
    }
}

/// Resolve the packet time: epoch column first, formatted column as fallback
pub fn decode_timestamp(epoch: &str, formatted: &str) -> Option<DateTime<Local>> {
    parse_epoch_timestamp(epoch).or_else(|| parse_formatted_timestamp(formatted))
}

/// Pick the IPv4 value if present, else IPv6, else `None`
pub fn select_address<'a>(ipv4: &'a str, ipv6: &'a str) -> Option<&'a str> {
    let ipv4 = first_value(ipv4);
    if !ipv4.is_empty() {
        return Some(ipv4);
    }
    let ipv6 = first_value(ipv6);
    if !ipv6.is_empty() {
        return Some(ipv6);
    }
    None
}

/// Pick the TCP port if present, else UDP, else 0
pub fn select_port(tcp: &str, udp: &str) -> u16 {
    parse_u16(tcp).or_else(|| parse_u16(udp)).unwrap_or(0)
}
