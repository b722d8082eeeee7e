//! The forward-only byte source behind an open trace.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use log::debug;

use crate::error::{Error, Result};

/// A forward-only stream of trace bytes. Compressed traces are piped
/// through a `bzip2 -dc` child process and read from its standard
/// output; uncompressed traces are read straight from the file.
/// Neither form supports seeking; fast-forward is re-open plus discard.
pub(crate) enum ByteSource {
    Piped { child: Child, stdout: ChildStdout },
    Plain(File),
}

impl ByteSource {
    /// Open the byte source for `path`, spawning the decompressor when
    /// the path names a `.bz2` file.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let open_error = |source| Error::Open {
            path: path.to_owned(),
            source,
        };

        if path.extension().map_or(false, |ext| ext == "bz2") {
            debug!("spawning bzip2 -dc {}", path.display());
            let mut child = Command::new("bzip2")
                .arg("-dc")
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(open_error)?;
            let stdout = child.stdout.take().ok_or_else(|| {
                Error::Open {
                    path: path.to_owned(),
                    source: io::Error::new(
                        ErrorKind::BrokenPipe,
                        "decompressor did not expose a readable stdout",
                    ),
                }
            })?;
            Ok(ByteSource::Piped { child, stdout })
        } else {
            let file = File::open(path).map_err(open_error)?;
            Ok(ByteSource::Plain(file))
        }
    }

    /// Read and discard exactly `remaining` bytes through a fixed
    /// scratch buffer. A stream shorter than that is a torn trace.
    pub(crate) fn skip(&mut self, mut remaining: u64) -> Result<()> {
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            match self.read(&mut scratch[..want]) {
                Ok(0) => return Err(Error::EofDuringRecord),
                Ok(n) => remaining -= n as u64,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Read for ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ByteSource::Piped { stdout, .. } => stdout.read(buf),
            ByteSource::Plain(file) => file.read(buf),
        }
    }
}

impl Drop for ByteSource {
    fn drop(&mut self) {
        if let ByteSource::Piped { child, .. } = self {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
