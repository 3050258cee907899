//! Column layout of the tool's field output
//!
//! The order here is load-bearing: it is both the `-e` argument order passed to
//! the tool and the column order the parser indexes into. Reordering a field is
//! a breaking change for every stored export.

/// Column indices of the mandatory core fields
pub mod core {
    pub const FRAME_NUMBER: usize = 0;
    pub const EPOCH_TIME: usize = 1;
    pub const FORMATTED_TIME: usize = 2;
    pub const FRAME_LENGTH: usize = 3;
    pub const IPV4_SOURCE: usize = 4;
    pub const IPV4_DESTINATION: usize = 5;
    pub const IPV6_SOURCE: usize = 6;
    pub const IPV6_DESTINATION: usize = 7;
    pub const TCP_SOURCE_PORT: usize = 8;
    pub const TCP_DESTINATION_PORT: usize = 9;
    pub const UDP_SOURCE_PORT: usize = 10;
    pub const UDP_DESTINATION_PORT: usize = 11;
    pub const DISPLAY_PROTOCOL: usize = 12;
    pub const PROTOCOL_STACK: usize = 13;
    pub const INFO: usize = 14;
    pub const TCP_FLAGS: usize = 15;
    pub const TCP_SEQUENCE: usize = 16;
    pub const TCP_ACKNOWLEDGMENT: usize = 17;
    pub const TCP_WINDOW: usize = 18;
}

/// Number of columns every line must carry
pub const CORE_FIELD_COUNT: usize = 19;

/// Tabs needed for the core columns to be present
pub const MIN_DELIMITERS: usize = CORE_FIELD_COUNT - 1;

/// Delimiter buffer size; covers core plus both optional tiers
pub const MAX_FIELDS: usize = 64;

/// Tool field names for the core columns
pub const CORE_FIELDS: [&str; CORE_FIELD_COUNT] = [
    "frame.number",
    "frame.time_epoch",
    "frame.time",
    "frame.len",
    "ip.src",
    "ip.dst",
    "ipv6.src",
    "ipv6.dst",
    "tcp.srcport",
    "tcp.dstport",
    "udp.srcport",
    "udp.dstport",
    "_ws.col.Protocol",
    "frame.protocols",
    "_ws.col.Info",
    "tcp.flags",
    "tcp.seq",
    "tcp.ack",
    "tcp.window_size",
];

/// Tool field names for the credential tier, matching `CredentialField::ALL`
pub const CREDENTIAL_FIELDS: [&str; 20] = [
    "http.authorization",
    "http.authbasic",
    "http.cookie",
    "ftp.request.command",
    "ftp.request.arg",
    "pop.request.command",
    "pop.request.parameter",
    "imap.request",
    "smtp.req.command",
    "smtp.auth.username",
    "smtp.auth.password",
    "telnet.data",
    "ntlmssp.auth.username",
    "ntlmssp.auth.domain",
    "kerberos.CNameString",
    "kerberos.realm",
    "ldap.simple",
    "snmp.community",
    "mysql.user",
    "sip.auth",
];

/// Column offsets inside the OS-fingerprint tier
pub mod os {
    pub const TTL: usize = 0;
    pub const DONT_FRAGMENT: usize = 1;
    pub const IP_ID: usize = 2;
    pub const WINDOW_SIZE_VALUE: usize = 3;
    pub const MSS: usize = 4;
    pub const WINDOW_SCALE: usize = 5;
    pub const SACK_PERMITTED: usize = 6;
    pub const TIMESTAMP_VALUE: usize = 7;
    pub const OPTION_KINDS: usize = 8;
    pub const HEADER_LENGTH: usize = 9;
    pub const SYN: usize = 10;
    pub const ACK: usize = 11;
    pub const HTTP_USER_AGENT: usize = 12;
    pub const HTTP_SERVER: usize = 13;
    pub const DHCP_HOSTNAME: usize = 14;
    pub const DHCP_VENDOR_CLASS: usize = 15;
    pub const SSH_BANNER: usize = 16;
    pub const IP_TOTAL_LENGTH: usize = 17;
}

/// Tool field names for the OS-fingerprint tier
pub const OS_FINGERPRINT_FIELDS: [&str; 18] = [
    "ip.ttl",
    "ip.flags.df",
    "ip.id",
    "tcp.window_size_value",
    "tcp.options.mss_val",
    "tcp.options.wscale.shift",
    "tcp.options.sack_perm",
    "tcp.options.timestamp.tsval",
    "tcp.option_kind",
    "tcp.hdr_len",
    "tcp.flags.syn",
    "tcp.flags.ack",
    "http.user_agent",
    "http.server",
    "dhcp.option.hostname",
    "dhcp.option.vendor_class_id",
    "ssh.protocol",
    "ip.len",
];

/// Where each optional tier starts on a line, given which tiers are requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub credential_start: Option<usize>,
    pub os_fingerprint_start: Option<usize>,
}

impl FieldLayout {
    pub fn new(credentials: bool, os_fingerprint: bool) -> Self {
        let credential_start = credentials.then_some(CORE_FIELD_COUNT);
        let os_start = CORE_FIELD_COUNT + if credentials { CREDENTIAL_FIELDS.len() } else { 0 };
        Self {
            credential_start,
            os_fingerprint_start: os_fingerprint.then_some(os_start),
        }
    }

    /// Layout with only the core columns
    pub fn core_only() -> Self {
        Self::new(false, false)
    }

    /// Total number of columns a full line carries under this layout
    pub fn total_fields(&self) -> usize {
        let mut total = CORE_FIELD_COUNT;
        if self.credential_start.is_some() {
            total += CREDENTIAL_FIELDS.len();
        }
        if self.os_fingerprint_start.is_some() {
            total += OS_FINGERPRINT_FIELDS.len();
        }
        total
    }

    /// Tool field names in column order
    pub fn tool_fields(&self) -> Vec<&'static str> {
        let mut fields = CORE_FIELDS.to_vec();
        if self.credential_start.is_some() {
            fields.extend_from_slice(&CREDENTIAL_FIELDS);
        }
        if self.os_fingerprint_start.is_some() {
            fields.extend_from_slice(&OS_FINGERPRINT_FIELDS);
        }
        fields
    }
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self::new(true, true)
    }
}
