//! Tiered extraction of rare, expensive column groups
//!
//! Credential and OS-fingerprint columns are empty on the vast majority of
//! packets. Each tier is gated twice before anything is materialised:
//!
//! 1. the line must reach the tier's first column at all;
//! 2. at least one column in the tier must be non-empty (the scan stops at
//!    the first hit).
//!
//! Only then are the columns copied into owned strings. Heap allocation on
//! this path is fine because it runs for a small fraction of packets.

use super::decoder::{parse_flag, parse_hex_u16, parse_u16, parse_u32, parse_u8};
use super::fields::{os, FieldLayout, CREDENTIAL_FIELDS, OS_FINGERPRINT_FIELDS};
use super::tokenizer::FieldTable;
use crate::types::{CredentialBundle, CredentialField, OsFingerprint};

/// Extracts the optional tiers for one field layout
#[derive(Debug, Clone, Copy)]
pub struct TierExtractor {
    layout: FieldLayout,
}

impl TierExtractor {
    pub fn new(layout: FieldLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> FieldLayout {
        self.layout
    }

    /// Credential tier, if any credential column carries a value
    pub fn credentials<const N: usize>(
        &self,
        table: &FieldTable<'_, N>,
    ) -> Option<Box<CredentialBundle>> {
        let start = self.layout.credential_start?;
        if !tier_has_data(table, start, CREDENTIAL_FIELDS.len()) {
            return None;
        }

        let fields: Vec<(CredentialField, Box<str>)> = CredentialField::ALL
            .iter()
            .enumerate()
            .filter_map(|(offset, &field)| {
                let value = table.field(start + offset);
                (!value.is_empty()).then(|| (field, Box::from(value)))
            })
            .collect();

        Some(Box::new(CredentialBundle { fields }))
    }

    /// OS-fingerprint tier, if any fingerprint column carries a value
    pub fn os_fingerprint<const N: usize>(
        &self,
        table: &FieldTable<'_, N>,
    ) -> Option<Box<OsFingerprint>> {
        let start = self.layout.os_fingerprint_start?;
        if !tier_has_data(table, start, OS_FINGERPRINT_FIELDS.len()) {
            return None;
        }

        let col = |offset: usize| table.field(start + offset);
        let text = |offset: usize| -> Option<Box<str>> {
            let value = col(offset);
            (!value.is_empty()).then(|| Box::from(value))
        };

        Some(Box::new(OsFingerprint {
            ttl: parse_u8(col(os::TTL)),
            dont_fragment: parse_flag(col(os::DONT_FRAGMENT)),
            // printed in hex (`0x1c46`)
            ip_id: parse_hex_u16(col(os::IP_ID)),
            window_size_value: parse_u16(col(os::WINDOW_SIZE_VALUE)),
            mss: parse_u16(col(os::MSS)),
            window_scale: parse_u8(col(os::WINDOW_SCALE)),
            sack_permitted: parse_flag(col(os::SACK_PERMITTED)).unwrap_or(false),
            timestamp_value: parse_u32(col(os::TIMESTAMP_VALUE)),
            tcp_option_kinds: text(os::OPTION_KINDS),
            tcp_header_length: parse_u8(col(os::HEADER_LENGTH)),
            syn: parse_flag(col(os::SYN)).unwrap_or(false),
            ack: parse_flag(col(os::ACK)).unwrap_or(false),
            http_user_agent: text(os::HTTP_USER_AGENT),
            http_server: text(os::HTTP_SERVER),
            dhcp_hostname: text(os::DHCP_HOSTNAME),
            dhcp_vendor_class: text(os::DHCP_VENDOR_CLASS),
            ssh_banner: text(os::SSH_BANNER),
            ip_total_length: parse_u16(col(os::IP_TOTAL_LENGTH)),
        }))
    }
}

/// Cheap presence check followed by a short-circuiting scan
fn tier_has_data<const N: usize>(table: &FieldTable<'_, N>, start: usize, len: usize) -> bool {
    if !table.has_field(start) {
        return false;
    }
    (start..start + len).any(|index| !table.field(index).is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fields::{CORE_FIELD_COUNT, MAX_FIELDS};

    fn line_with(columns: &[(usize, &str)], total: usize) -> String {
        let mut fields = vec![""; total];
        for &(index, value) in columns {
            fields[index] = value;
        }
        fields.join("\t")
    }

    #[test]
    fn test_core_only_line_has_no_tiers() {
        let line = line_with(&[(0, "1")], CORE_FIELD_COUNT);
        let table = FieldTable::<MAX_FIELDS>::new(&line);
        let extractor = TierExtractor::new(FieldLayout::default());
        assert!(extractor.credentials(&table).is_none());
        assert!(extractor.os_fingerprint(&table).is_none());
    }

    #[test]
    fn test_empty_tier_columns_stay_absent() {
        let layout = FieldLayout::default();
        let line = line_with(&[(0, "1")], layout.total_fields());
        let table = FieldTable::<MAX_FIELDS>::new(&line);
        let extractor = TierExtractor::new(layout);
        assert!(extractor.credentials(&table).is_none());
        assert!(extractor.os_fingerprint(&table).is_none());
    }

    #[test]
    fn test_credentials_materialised() {
        let layout = FieldLayout::default();
        let start = layout.credential_start.unwrap();
        let line = line_with(
            &[(start + 3, "USER"), (start + 4, "anonymous")],
            layout.total_fields(),
        );
        let table = FieldTable::<MAX_FIELDS>::new(&line);

        let bundle = TierExtractor::new(layout).credentials(&table).unwrap();
        assert_eq!(bundle.fields.len(), 2);
        assert_eq!(bundle.get(CredentialField::FtpCommand), Some("USER"));
        assert_eq!(bundle.get(CredentialField::FtpArgument), Some("anonymous"));
    }

    #[test]
    fn test_os_fingerprint_materialised() {
        let layout = FieldLayout::default();
        let start = layout.os_fingerprint_start.unwrap();
        let line = line_with(
            &[
                (start + os::TTL, "64"),
                (start + os::DONT_FRAGMENT, "1"),
                (start + os::IP_ID, "0x1c46"),
                (start + os::MSS, "1460"),
                (start + os::SYN, "1"),
                (start + os::HTTP_USER_AGENT, "curl/8.5.0"),
            ],
            layout.total_fields(),
        );
        let table = FieldTable::<MAX_FIELDS>::new(&line);

        let fp = TierExtractor::new(layout).os_fingerprint(&table).unwrap();
        assert_eq!(fp.ttl, Some(64));
        assert_eq!(fp.dont_fragment, Some(true));
        assert_eq!(fp.ip_id, Some(0x1c46));
        assert_eq!(fp.mss, Some(1460));
        assert!(fp.syn);
        assert!(!fp.ack);
        assert_eq!(fp.http_user_agent.as_deref(), Some("curl/8.5.0"));
        assert_eq!(fp.ssh_banner, None);
    }

    #[test]
    fn test_disabled_tier_is_never_read() {
        let layout = FieldLayout::new(false, true);
        let start = layout.os_fingerprint_start.unwrap();
        let line = line_with(&[(start + os::TTL, "128")], layout.total_fields());
        let table = FieldTable::<MAX_FIELDS>::new(&line);
        let extractor = TierExtractor::new(layout);

        assert!(extractor.credentials(&table).is_none());
        assert_eq!(extractor.os_fingerprint(&table).unwrap().ttl, Some(128));
    }
}
