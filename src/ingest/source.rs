//! Line sources for the producer loop
//!
//! [`LineSource`] is the seam between the producer and where lines come from.
//! [`ToolProcess`] runs the inspection tool against a capture file and reads
//! its stdout; [`ReaderSource`] wraps any buffered reader, which covers
//! previously exported field-text files and tests.

use crate::config::ToolConfig;
use crate::error::{IngestError, Result, ResultExt};
use crate::parser::FieldLayout;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

/// How much of the tool's stderr is kept for error reports
const STDERR_TAIL_BYTES: usize = 4096;

/// Where the producer reads lines from
pub trait LineSource: Send {
    /// Read the next line into `buf`, replacing its contents
    ///
    /// Returns `Ok(false)` once the output is exhausted. The line terminator,
    /// if any, is left in the buffer.
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool>;

    /// Ask the source to stop producing output
    fn terminate(&mut self) {}

    /// Called once after the output is exhausted; reports the exit code
    fn finish(&mut self) -> Result<Option<i32>> {
        Ok(None)
    }

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Any buffered reader as a line source
pub struct ReaderSource<R> {
    reader: R,
    name: String,
}

impl<R: BufRead + Send> ReaderSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
        }
    }
}

impl ReaderSource<BufReader<File>> {
    /// Read a file of previously exported field output
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Opening {:?}", path))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead + Send> LineSource for ReaderSource<R> {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();
        Ok(self.reader.read_until(b'\n', buf)? > 0)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// The inspection tool running against one capture file
pub struct ToolProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_tail: Option<JoinHandle<String>>,
    binary: String,
    reaped: bool,
}

impl ToolProcess {
    /// Arguments for a tab-separated field export of `capture`
    ///
    /// The set is fixed; only the capture path and the requested tiers vary.
    pub fn command_args(capture: &Path, layout: &FieldLayout) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-r".into(),
            capture.as_os_str().to_owned(),
            "-n".into(),
            "-T".into(),
            "fields".into(),
            "-E".into(),
            "separator=/t".into(),
            "-E".into(),
            "occurrence=f".into(),
            "-E".into(),
            "quote=n".into(),
            "-E".into(),
            "header=n".into(),
        ];
        for field in layout.tool_fields() {
            args.push("-e".into());
            args.push(field.into());
        }
        args
    }

    /// Validate the capture path and start the tool
    pub fn spawn(tool: &ToolConfig, capture: &Path, layout: FieldLayout) -> Result<Self> {
        if !capture.is_file() {
            return Err(IngestError::CaptureNotFound(capture.to_path_buf()));
        }

        let binary = tool.binary.display().to_string();
        let mut child = Command::new(&tool.binary)
            .args(Self::command_args(capture, &layout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| IngestError::ToolSpawn {
                binary: binary.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            IngestError::Channel("tool stdout was not captured".to_string())
        })?;
        let stderr_tail = child.stderr.take().map(|stderr| {
            std::thread::Builder::new()
                .name("tool-stderr".to_string())
                .spawn(move || drain_stderr(stderr))
        });
        let stderr_tail = match stderr_tail {
            Some(Ok(handle)) => Some(handle),
            Some(Err(e)) => {
                tracing::warn!("Could not start stderr reader: {}", e);
                None
            }
            None => None,
        };

        tracing::info!("Started {} (pid {}) on {:?}", binary, child.id(), capture);

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(64 * 1024, stdout),
            stderr_tail,
            binary,
            reaped: false,
        })
    }

    fn take_stderr(&mut self) -> String {
        self.stderr_tail
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl LineSource for ToolProcess {
    fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();
        Ok(self.stdout.read_until(b'\n', buf)? > 0)
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            tracing::debug!("Kill of {} failed (already exited?): {}", self.binary, e);
        }
        let _ = self.child.wait();
        self.reaped = true;
        let _ = self.take_stderr();
    }

    fn finish(&mut self) -> Result<Option<i32>> {
        if self.reaped {
            return Ok(None);
        }
        let status = self.child.wait()?;
        self.reaped = true;
        let stderr = self.take_stderr();

        if status.success() {
            if !stderr.trim().is_empty() {
                tracing::warn!("{}: {}", self.binary, stderr.trim());
            }
            Ok(status.code())
        } else {
            Err(IngestError::ToolExit {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }

    fn describe(&self) -> String {
        format!("{} (pid {})", self.binary, self.child.id())
    }
}

impl Drop for ToolProcess {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Read stderr to the end, keeping only the last `STDERR_TAIL_BYTES`
fn drain_stderr(mut stderr: impl Read) -> String {
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stderr.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    #[test]
    fn test_reader_source_lines() {
        let mut source = ReaderSource::new(Cursor::new("a\tb\nc\n\nlast"), "memory");
        let mut buf = Vec::new();

        assert!(source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"a\tb\n");
        assert!(source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"c\n");
        assert!(source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"\n");
        assert!(source.read_line(&mut buf).unwrap());
        assert_eq!(buf, b"last");
        assert!(!source.read_line(&mut buf).unwrap());
        assert_eq!(source.finish().unwrap(), None);
        assert_eq!(source.describe(), "memory");
    }

    #[test]
    fn test_command_args() {
        let args = ToolProcess::command_args(Path::new("/tmp/x.pcapng"), &FieldLayout::core_only());
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(&args[..2], &["-r", "/tmp/x.pcapng"]);
        assert!(args.windows(2).any(|w| w == ["-E", "separator=/t"]));
        assert!(args.windows(2).any(|w| w == ["-T", "fields"]));
        let fields: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-e")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(fields.len(), 19);
        assert_eq!(fields[0], "frame.number");
        assert_eq!(fields[18], "tcp.window_size");
    }

    #[test]
    fn test_spawn_rejects_missing_capture() {
        let result = ToolProcess::spawn(
            &ToolConfig::default(),
            &PathBuf::from("/definitely/not/here.pcapng"),
            FieldLayout::default(),
        );
        assert!(matches!(result, Err(IngestError::CaptureNotFound(_))));
    }

    #[test]
    fn test_open_missing_export() {
        match ReaderSource::open("/no/such/export.tsv") {
            Err(e) => assert!(e.to_string().starts_with("Opening")),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_drain_stderr_keeps_tail() {
        let input = "x".repeat(STDERR_TAIL_BYTES * 2) + "END";
        let tail = drain_stderr(Cursor::new(input));
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("END"));
    }
}
