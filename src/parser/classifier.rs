//! Transport and application protocol classification
//!
//! The tool gives us two hints per packet: the colon-separated protocol stack
//! (`eth:ethertype:ip:tcp:tls`) and its own display protocol column. The
//! transport label comes from the stack. The application label comes from the
//! display column unless that column only names a transport, in which case the
//! innermost stack segment is used.
//!
//! Version-qualified labels (`TLSv1.2`, `SSHv2`) are recovered from the info
//! text when the display column did not already carry them. When no version
//! marker is found the earliest version of the family is assumed; this is a
//! best-effort default, not a guarantee.

use super::intern::StringInterner;
use crate::types::TransportProtocol;
use std::sync::Arc;

/// Stack segments that never name an application protocol
const PLACEHOLDER_SEGMENTS: [&str; 8] = [
    "tcp", "udp", "icmp", "icmpv6", "arp", "rarp", "data", "ip",
];

/// Display column values that only name a transport
const TRANSPORT_HINTS: [&str; 4] = ["TCP", "UDP", "ICMP", "ICMPv6"];

/// Curated labels for stack segments whose display name is not a plain upper-case
const SEGMENT_LABELS: [(&str, &str); 12] = [
    ("http2", "HTTP2"),
    ("http", "HTTP"),
    ("mdns", "MDNS"),
    ("llmnr", "LLMNR"),
    ("nbns", "NBNS"),
    ("ssdp", "SSDP"),
    ("dhcpv6", "DHCPv6"),
    ("dhcp", "DHCP"),
    ("quic", "QUIC"),
    ("gquic", "GQUIC"),
    ("smb2", "SMB2"),
    ("websocket", "WebSocket"),
];

/// Version markers per family, newest first, with the default last
const TLS_VERSIONS: [&str; 4] = ["TLSv1.3", "TLSv1.2", "TLSv1.1", "TLSv1"];
const SSH_VERSIONS: [(&str, &str); 2] = [("SSH-2.0", "SSHv2"), ("SSHv2", "SSHv2")];
const SSH_DEFAULT: &str = "SSHv1";

/// Classify the transport protocol from the stack string
///
/// The first transport segment wins; a real stack has only one.
pub fn classify_transport(stack: &str) -> TransportProtocol {
    for segment in stack.split(':') {
        let transport = if segment.eq_ignore_ascii_case("tcp") {
            TransportProtocol::Tcp
        } else if segment.eq_ignore_ascii_case("udp") {
            TransportProtocol::Udp
        } else if segment.eq_ignore_ascii_case("icmp") || segment.eq_ignore_ascii_case("icmpv6") {
            TransportProtocol::Icmp
        } else if segment.eq_ignore_ascii_case("arp") || segment.eq_ignore_ascii_case("rarp") {
            TransportProtocol::Arp
        } else {
            continue;
        };
        return transport;
    }
    TransportProtocol::Unknown
}

fn is_transport_hint(hint: &str) -> bool {
    TRANSPORT_HINTS.iter().any(|t| t.eq_ignore_ascii_case(hint))
}

fn is_placeholder(segment: &str) -> bool {
    PLACEHOLDER_SEGMENTS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(segment))
}

/// Pick a TLS version from the info text, defaulting to the oldest
pub fn tls_version(info: &str) -> &'static str {
    TLS_VERSIONS
        .iter()
        .copied()
        .find(|v| info.contains(v))
        .unwrap_or(TLS_VERSIONS[TLS_VERSIONS.len() - 1])
}

/// Pick an SSH protocol version from the info text, defaulting to the oldest
pub fn ssh_version(info: &str) -> &'static str {
    SSH_VERSIONS
        .iter()
        .find(|(marker, _)| info.contains(marker))
        .map(|(_, label)| *label)
        .unwrap_or(SSH_DEFAULT)
}

/// Derive the application label without interning
///
/// Borrowed results point into `hint` or `stack`; the upper-casing fallback is
/// the only path that allocates.
pub fn application_label<'a>(
    hint: &'a str,
    stack: &'a str,
    info: &str,
) -> std::borrow::Cow<'a, str> {
    use std::borrow::Cow;

    let hint = hint.trim();
    if !hint.is_empty() && !is_transport_hint(hint) {
        return Cow::Borrowed(hint);
    }

    let last = stack.rsplit(':').next().unwrap_or("");
    if last.is_empty() || is_placeholder(last) {
        return Cow::Borrowed("");
    }

    if last.eq_ignore_ascii_case("tls") || last.eq_ignore_ascii_case("ssl") {
        return Cow::Borrowed(tls_version(info));
    }
    if last.eq_ignore_ascii_case("ssh") {
        return Cow::Borrowed(ssh_version(info));
    }
    if let Some((_, label)) = SEGMENT_LABELS
        .iter()
        .find(|(segment, _)| segment.eq_ignore_ascii_case(last))
    {
        return Cow::Borrowed(label);
    }

    if last.bytes().any(|b| b.is_ascii_lowercase()) {
        Cow::Owned(last.to_ascii_uppercase())
    } else {
        Cow::Borrowed(last)
    }
}

/// Classifier bound to a run's protocol pool
#[derive(Debug, Clone)]
pub struct ProtocolClassifier {
    interner: Arc<StringInterner>,
}

impl ProtocolClassifier {
    pub fn new(interner: Arc<StringInterner>) -> Self {
        Self { interner }
    }

    /// Classify one packet: (transport, interned application label)
    pub fn classify(&self, hint: &str, stack: &str, info: &str) -> (TransportProtocol, Arc<str>) {
        let transport = classify_transport(stack);
        let label = application_label(hint, stack, info);
        (transport, self.interner.protocol(&label))
    }
}
