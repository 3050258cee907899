//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use packet_ingest::parser::{FieldLayout, LineParser, StringInterner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Parser with a fresh interner and all tiers enabled
pub fn create_test_parser() -> LineParser {
    LineParser::new(Arc::new(StringInterner::new()), FieldLayout::default())
}

/// Write an executable shell script that stands in for the inspection tool
#[cfg(unix)]
pub fn write_fake_tool(dir: &Path, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-tshark");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// An empty file to pass as the capture path
pub fn touch_capture(dir: &Path) -> PathBuf {
    let path = dir.join("trace.pcapng");
    std::fs::write(&path, b"").unwrap();
    path
}
