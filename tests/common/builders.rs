//! Test data builders for tool output lines

use packet_ingest::parser::fields::{
    core, os, CORE_FIELD_COUNT, CREDENTIAL_FIELDS, OS_FINGERPRINT_FIELDS,
};
use packet_ingest::types::CredentialField;

/// Builder for one tab-separated line in the default (all tiers) layout
pub struct PacketLineBuilder {
    core: Vec<String>,
    credentials: Vec<String>,
    os: Vec<String>,
    with_tiers: bool,
}

impl PacketLineBuilder {
    /// A valid TCP line for `frame`; every other column has a plausible value
    pub fn new(frame: u32) -> Self {
        let mut core = vec![String::new(); CORE_FIELD_COUNT];
        core[core::FRAME_NUMBER] = frame.to_string();
        core[core::EPOCH_TIME] = format!("1700000000.{:09}", frame % 1_000_000_000);
        core[core::FRAME_LENGTH] = "60".to_string();
        core[core::IPV4_SOURCE] = "10.0.0.1".to_string();
        core[core::IPV4_DESTINATION] = "10.0.0.2".to_string();
        core[core::TCP_SOURCE_PORT] = "49152".to_string();
        core[core::TCP_DESTINATION_PORT] = "80".to_string();
        core[core::DISPLAY_PROTOCOL] = "TCP".to_string();
        core[core::PROTOCOL_STACK] = "eth:ethertype:ip:tcp".to_string();
        core[core::INFO] = "49152 → 80 [ACK]".to_string();
        core[core::TCP_FLAGS] = "0x0010".to_string();
        core[core::TCP_SEQUENCE] = "1".to_string();
        core[core::TCP_ACKNOWLEDGMENT] = "1".to_string();
        core[core::TCP_WINDOW] = "502".to_string();

        Self {
            core,
            credentials: vec![String::new(); CREDENTIAL_FIELDS.len()],
            os: vec![String::new(); OS_FINGERPRINT_FIELDS.len()],
            with_tiers: false,
        }
    }

    /// Set any core column
    pub fn core(mut self, index: usize, value: &str) -> Self {
        self.core[index] = value.to_string();
        self
    }

    pub fn epoch(self, value: &str) -> Self {
        self.core(core::EPOCH_TIME, value)
    }

    pub fn addresses(self, source: &str, destination: &str) -> Self {
        self.core(core::IPV4_SOURCE, source).core(core::IPV4_DESTINATION, destination)
    }

    pub fn ipv6(self, source: &str, destination: &str) -> Self {
        self.core(core::IPV6_SOURCE, source).core(core::IPV6_DESTINATION, destination)
    }

    /// Turn the line into a UDP datagram with the given ports
    pub fn udp(self, source_port: &str, destination_port: &str) -> Self {
        self.core(core::TCP_SOURCE_PORT, "")
            .core(core::TCP_DESTINATION_PORT, "")
            .core(core::TCP_FLAGS, "")
            .core(core::TCP_SEQUENCE, "")
            .core(core::TCP_ACKNOWLEDGMENT, "")
            .core(core::TCP_WINDOW, "")
            .core(core::UDP_SOURCE_PORT, source_port)
            .core(core::UDP_DESTINATION_PORT, destination_port)
    }

    pub fn protocol(self, hint: &str, stack: &str, info: &str) -> Self {
        self.core(core::DISPLAY_PROTOCOL, hint)
            .core(core::PROTOCOL_STACK, stack)
            .core(core::INFO, info)
    }

    pub fn credential(mut self, field: CredentialField, value: &str) -> Self {
        let offset = CredentialField::ALL
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        self.credentials[offset] = value.to_string();
        self.with_tiers = true;
        self
    }

    /// Set an OS-fingerprint column by its offset in `fields::os`
    pub fn os_field(mut self, offset: usize, value: &str) -> Self {
        self.os[offset] = value.to_string();
        self.with_tiers = true;
        self
    }

    /// Emit the (empty) tier columns even when nothing was set
    pub fn with_empty_tiers(mut self) -> Self {
        self.with_tiers = true;
        self
    }

    pub fn build(self) -> String {
        let mut columns = self.core;
        if self.with_tiers {
            columns.extend(self.credentials);
            columns.extend(self.os);
        }
        columns.join("\t")
    }
}

/// A SYN from a typical Linux client, with the fingerprint tier filled in
pub fn linux_syn_line(frame: u32) -> String {
    PacketLineBuilder::new(frame)
        .core(core::TCP_FLAGS, "0x0002")
        .core(core::INFO, "49152 → 80 [SYN]")
        .os_field(os::TTL, "64")
        .os_field(os::DONT_FRAGMENT, "1")
        .os_field(os::IP_ID, "0x1c46")
        .os_field(os::WINDOW_SIZE_VALUE, "64240")
        .os_field(os::MSS, "1460")
        .os_field(os::WINDOW_SCALE, "7")
        .os_field(os::SACK_PERMITTED, "1")
        .os_field(os::SYN, "1")
        .os_field(os::ACK, "0")
        .build()
}

/// `count` valid lines numbered from 1, newline-terminated
pub fn generate_lines(count: u32) -> String {
    (1..=count)
        .map(|frame| PacketLineBuilder::new(frame).build() + "\n")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_column_counts() {
        let core_only = PacketLineBuilder::new(1).build();
        assert_eq!(core_only.matches('\t').count(), CORE_FIELD_COUNT - 1);

        let tiered = PacketLineBuilder::new(1).with_empty_tiers().build();
        assert_eq!(
            tiered.matches('\t').count(),
            CORE_FIELD_COUNT + CREDENTIAL_FIELDS.len() + OS_FINGERPRINT_FIELDS.len() - 1
        );
    }
}
