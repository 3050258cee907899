//! Core data types for packet-ingest
//!
//! [`PacketRecord`] is the unit handed to downstream consumers. Strings that
//! repeat across millions of packets (addresses, protocol labels) are shared
//! `Arc<str>` handles owned by the run's [`crate::parser::StringInterner`];
//! the free-form info column is per-record.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Address used when neither the IPv4 nor the IPv6 column carries a value
pub const UNSPECIFIED_ADDRESS: &str = "0.0.0.0";

/// Transport-layer (L4) classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Icmp,
    Arp,
    #[default]
    Unknown,
}

impl TransportProtocol {
    /// Get the display name for this protocol
    pub fn display_name(&self) -> &'static str {
        match self {
            TransportProtocol::Tcp => "TCP",
            TransportProtocol::Udp => "UDP",
            TransportProtocol::Icmp => "ICMP",
            TransportProtocol::Arp => "ARP",
            TransportProtocol::Unknown => "Unknown",
        }
    }

    /// Whether this protocol carries port numbers
    pub fn has_ports(&self) -> bool {
        matches!(self, TransportProtocol::Tcp | TransportProtocol::Udp)
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// TCP header control fields, all zero for non-TCP packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TcpControl {
    pub flags: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    /// Calculated window size (after scaling), so it may exceed 16 bits
    pub window: u32,
}

impl TcpControl {
    pub const FIN: u16 = 0x001;
    pub const SYN: u16 = 0x002;
    pub const RST: u16 = 0x004;
    pub const PSH: u16 = 0x008;
    pub const ACK: u16 = 0x010;
    pub const URG: u16 = 0x020;

    /// Check if a flag bit is set
    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// True for the opening segment of a handshake (SYN without ACK)
    pub fn is_syn_only(&self) -> bool {
        self.has_flag(Self::SYN) && !self.has_flag(Self::ACK)
    }
}

/// Credential-bearing field names, in tool column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CredentialField {
    HttpAuthorization,
    HttpBasicAuth,
    HttpCookie,
    FtpCommand,
    FtpArgument,
    PopCommand,
    PopParameter,
    ImapRequest,
    SmtpCommand,
    SmtpAuthUsername,
    SmtpAuthPassword,
    TelnetData,
    NtlmsspUser,
    NtlmsspDomain,
    KerberosName,
    KerberosRealm,
    LdapSimpleBind,
    SnmpCommunity,
    DatabaseUser,
    SipAuthorization,
}

impl CredentialField {
    /// All credential fields, in the order they appear on the line
    pub const ALL: [CredentialField; 20] = [
        CredentialField::HttpAuthorization,
        CredentialField::HttpBasicAuth,
        CredentialField::HttpCookie,
        CredentialField::FtpCommand,
        CredentialField::FtpArgument,
        CredentialField::PopCommand,
        CredentialField::PopParameter,
        CredentialField::ImapRequest,
        CredentialField::SmtpCommand,
        CredentialField::SmtpAuthUsername,
        CredentialField::SmtpAuthPassword,
        CredentialField::TelnetData,
        CredentialField::NtlmsspUser,
        CredentialField::NtlmsspDomain,
        CredentialField::KerberosName,
        CredentialField::KerberosRealm,
        CredentialField::LdapSimpleBind,
        CredentialField::SnmpCommunity,
        CredentialField::DatabaseUser,
        CredentialField::SipAuthorization,
    ];
}

/// Credential material found on one packet
///
/// Sparse: only the columns that carried a value are stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CredentialBundle {
    pub fields: Vec<(CredentialField, Box<str>)>,
}

impl CredentialBundle {
    /// Look up a single field
    pub fn get(&self, field: CredentialField) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Passive OS-fingerprint indicators
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct OsFingerprint {
    pub ttl: Option<u8>,
    pub dont_fragment: Option<bool>,
    pub ip_id: Option<u16>,
    pub window_size_value: Option<u16>,
    pub mss: Option<u16>,
    pub window_scale: Option<u8>,
    pub sack_permitted: bool,
    pub timestamp_value: Option<u32>,
    pub tcp_option_kinds: Option<Box<str>>,
    pub tcp_header_length: Option<u8>,
    pub syn: bool,
    pub ack: bool,
    pub http_user_agent: Option<Box<str>>,
    pub http_server: Option<Box<str>>,
    pub dhcp_hostname: Option<Box<str>>,
    pub dhcp_vendor_class: Option<Box<str>>,
    pub ssh_banner: Option<Box<str>>,
    pub ip_total_length: Option<u16>,
}

impl OsFingerprint {
    /// Initial TTL rounded up to the usual OS defaults (32, 64, 128, 255)
    pub fn initial_ttl(&self) -> Option<u8> {
        self.ttl.map(|ttl| match ttl {
            0..=32 => 32,
            33..=64 => 64,
            65..=128 => 128,
            _ => 255,
        })
    }
}

/// One parsed line of tool output
///
/// Records are moved through the queue to the consumer; nothing in the
/// pipeline keeps a copy after the batch is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecord {
    /// Frame number assigned by the tool, always > 0
    pub frame_number: u32,
    /// Capture time in local wall-clock time, rounded to 100 ns
    pub timestamp: DateTime<Local>,
    /// Frame length in bytes; 0 marks a zero-length capture artifact
    pub length: u16,
    pub source: Arc<str>,
    pub destination: Arc<str>,
    /// 0 when the packet has no TCP/UDP ports
    pub source_port: u16,
    pub destination_port: u16,
    pub transport: TransportProtocol,
    /// Application-layer label, empty when none was detected
    pub application: Arc<str>,
    pub info: Box<str>,
    pub tcp: TcpControl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Box<CredentialBundle>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_fingerprint: Option<Box<OsFingerprint>>,
}

impl PacketRecord {
    /// Whether credential-bearing content was present on this packet
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Whether an application-layer protocol was identified
    pub fn has_application(&self) -> bool {
        !self.application.is_empty()
    }

    /// The label a packet list would show: application, else transport
    pub fn protocol_label(&self) -> &str {
        if self.has_application() {
            &self.application
        } else {
            self.transport.display_name()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        assert_eq!(TransportProtocol::Tcp.to_string(), "TCP");
        assert_eq!(TransportProtocol::default(), TransportProtocol::Unknown);
        assert!(TransportProtocol::Udp.has_ports());
        assert!(!TransportProtocol::Arp.has_ports());
    }

    #[test]
    fn test_tcp_flags() {
        let tcp = TcpControl {
            flags: 0x0002,
            ..Default::default()
        };
        assert!(tcp.is_syn_only());

        let tcp = TcpControl {
            flags: 0x0012,
            ..Default::default()
        };
        assert!(tcp.has_flag(TcpControl::ACK));
        assert!(!tcp.is_syn_only());
    }

    #[test]
    fn test_credential_bundle_lookup() {
        let bundle = CredentialBundle {
            fields: vec![(CredentialField::FtpCommand, "USER".into())],
        };
        assert_eq!(bundle.get(CredentialField::FtpCommand), Some("USER"));
        assert_eq!(bundle.get(CredentialField::FtpArgument), None);
        assert!(!bundle.is_empty());
    }

    #[test]
    fn test_initial_ttl() {
        let fp = OsFingerprint {
            ttl: Some(57),
            ..Default::default()
        };
        assert_eq!(fp.initial_ttl(), Some(64));
        assert_eq!(OsFingerprint::default().initial_ttl(), None);
    }

    #[test]
    fn test_protocol_label_falls_back_to_transport() {
        let mut record = PacketRecord {
            frame_number: 1,
            timestamp: Local::now(),
            length: 60,
            source: Arc::from(UNSPECIFIED_ADDRESS),
            destination: Arc::from(UNSPECIFIED_ADDRESS),
            source_port: 0,
            destination_port: 0,
            transport: TransportProtocol::Udp,
            application: Arc::from(""),
            info: "".into(),
            tcp: TcpControl::default(),
            credentials: None,
            os_fingerprint: None,
        };
        assert!(!record.has_application());
        assert_eq!(record.protocol_label(), "UDP");

        record.application = Arc::from("DNS");
        assert!(record.has_application());
        assert_eq!(record.protocol_label(), "DNS");
    }
}
