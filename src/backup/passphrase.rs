//! One-shot delivery of the encryption passphrase through a private pipe.
//!
//! The read end is inherited by exactly one child, the encryptor, which is told the
//! descriptor number on its command line. The parent writes the passphrase plus a
//! newline and closes its end; end of file is the only terminator.

use crate::backup::redacted::RedactedString;
use std::io::{self, PipeReader, PipeWriter, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

#[derive(Debug)]
pub struct PassphraseChannel {
    reader: PipeReader,
    writer: PipeWriter,
}

impl PassphraseChannel {
    pub fn open() -> io::Result<Self> {
        let (reader, writer) = io::pipe()?;
        Ok(Self { reader, writer })
    }

    /// Descriptor number the child will read the passphrase from.
    pub fn child_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    /// Lets the read end survive `exec` in the child spawned from `command`.
    ///
    /// Both ends stay close-on-exec in the parent, so no other child inherits them.
    pub fn attach(&self, command: &mut Command) {
        let fd = self.child_fd();
        // SAFETY: only async-signal-safe fcntl calls run between fork and exec.
        unsafe {
            command.pre_exec(move || {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    /// Closes the parent's read end, writes `passphrase + "\n"` and closes the
    /// write end. Call after the child was spawned.
    pub fn deliver(self, passphrase: &RedactedString) -> io::Result<()> {
        let Self { reader, mut writer } = self;
        drop(reader);
        writer.write_all(&passphrase.as_line_bytes())?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::process::{spawn, NormalizedExitStatus};
    use tempfile::TempDir;

    fn round_trip(passphrase: &str) -> Vec<u8> {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("received");
        let channel = PassphraseChannel::open().unwrap();

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg("cat \"/dev/fd/$1\" > \"$2\"")
            .arg("sh")
            .arg(channel.child_fd().to_string())
            .arg(&out);
        channel.attach(&mut command);
        let mut child = spawn(&mut command).unwrap();
        drop(command);

        channel.deliver(&RedactedString::from(passphrase)).unwrap();
        assert_eq!(child.wait(), NormalizedExitStatus::Success);
        std::fs::read(&out).unwrap()
    }

    #[test]
    fn test_child_receives_passphrase_and_newline() {
        assert_eq!(round_trip("correct horse"), b"correct horse\n");
    }

    #[test]
    fn test_empty_passphrase() {
        assert_eq!(round_trip(""), b"\n");
    }

    #[test]
    fn test_passphrase_with_embedded_newline_and_nul() {
        assert_eq!(round_trip("a\nb\0c"), b"a\nb\0c\n");
    }

    #[test]
    fn test_large_passphrase() {
        let long = "x".repeat(100_000);
        let mut expected = long.clone().into_bytes();
        expected.push(b'\n');
        assert_eq!(round_trip(&long), expected);
    }

    #[test]
    fn test_fd_not_inherited_without_attach() {
        let channel = PassphraseChannel::open().unwrap();
        let fd = channel.child_fd();
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg("test -e \"/dev/fd/$1\"")
            .arg("sh")
            .arg(fd.to_string());
        let mut child = spawn(&mut command).unwrap();
        assert_eq!(child.wait(), NormalizedExitStatus::Failed(1));
    }
}
