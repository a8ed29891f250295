// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-session byte channels used as guest stdin and stdout.
//!
//! Each channel is a named file the sandbox configuration can reach by path.
//! Names derive from the session identifier plus a randomized suffix, so
//! concurrent sessions never collide. On Linux the files live in `/dev/shm`
//! (a shared-memory region); elsewhere they fall back to the system temp
//! directory. Upper layers only see the channel contract: append, reset,
//! read-all, teardown.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::errors::{sandbox_io, Result};

const SHARED_MEM_DIR: &str = "/dev/shm";

/// Role of a channel within its session, reflected in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Stdin,
    Stdout,
}

impl ChannelRole {
    fn label(self) -> &'static str {
        match self {
            ChannelRole::Stdin => "stdin",
            ChannelRole::Stdout => "stdout",
        }
    }
}

/// A byte-addressable, seekable, truncatable channel backed by a named file.
///
/// The backing file is unlinked when the channel is dropped; [`IoChannel::remove`]
/// does the same eagerly and reports failures.
#[derive(Debug)]
pub struct IoChannel {
    file: NamedTempFile,
    role: ChannelRole,
}

impl IoChannel {
    /// Create a channel for the given session in the default backing
    /// directory (`/dev/shm` when present).
    pub fn create(session_id: Uuid, role: ChannelRole) -> Result<Self> {
        Self::create_in(backing_dir(), session_id, role)
    }

    /// Create a channel in an explicit directory. Names follow the pattern
    /// `<session-id>_<role>-<random>.tmp`.
    pub fn create_in(dir: impl AsRef<Path>, session_id: Uuid, role: ChannelRole) -> Result<Self> {
        let dir = dir.as_ref();
        let file = tempfile::Builder::new()
            .prefix(&format!("{}_{}-", session_id, role.label()))
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| sandbox_io(dir, e))?;
        Ok(Self { file, role })
    }

    /// Path the sandbox configuration can open this channel at.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn role(&self) -> ChannelRole {
        self.role
    }

    /// Append bytes at the current position.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .as_file_mut()
            .write_all(bytes)
            .map_err(|e| sandbox_io(self.file.path(), e))
    }

    /// Flush buffered writes to the backing storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .as_file_mut()
            .sync_all()
            .map_err(|e| sandbox_io(self.file.path(), e))
    }

    /// Rewind to the start without discarding contents.
    pub fn seek_start(&mut self) -> Result<()> {
        self.file
            .as_file_mut()
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| sandbox_io(self.file.path(), e))
    }

    /// Rewind and discard all contents, readying the channel for reuse
    /// within the session.
    pub fn reset(&mut self) -> Result<()> {
        self.seek_start()?;
        self.file
            .as_file_mut()
            .set_len(0)
            .map_err(|e| sandbox_io(self.file.path(), e))
    }

    /// Read the channel's full contents from the start.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.seek_start()?;
        let mut buf = Vec::new();
        self.file
            .as_file_mut()
            .read_to_end(&mut buf)
            .map_err(|e| sandbox_io(self.file.path(), e))?;
        Ok(buf)
    }

    /// Close the channel and unlink its backing storage.
    pub fn remove(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close().map_err(|e| sandbox_io(&path, e))
    }
}

/// The stdin/stdout pair owned by one session.
#[derive(Debug)]
pub struct ChannelPair {
    pub stdin: IoChannel,
    pub stdout: IoChannel,
}

impl ChannelPair {
    /// Create both channels for a session; if the second creation fails the
    /// first is unlinked before returning.
    pub fn for_session(session_id: Uuid) -> Result<Self> {
        let stdin = IoChannel::create(session_id, ChannelRole::Stdin)?;
        let stdout = match IoChannel::create(session_id, ChannelRole::Stdout) {
            Ok(stdout) => stdout,
            Err(e) => {
                let _ = stdin.remove();
                return Err(e);
            }
        };
        Ok(Self { stdin, stdout })
    }

    /// Unlink both channels. Errors on the first do not leak the second.
    pub fn remove(self) -> Result<()> {
        let stdin_result = self.stdin.remove();
        let stdout_result = self.stdout.remove();
        stdin_result.and(stdout_result)
    }
}

fn backing_dir() -> PathBuf {
    let shm = Path::new(SHARED_MEM_DIR);
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}
