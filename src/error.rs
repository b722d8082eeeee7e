//! Representations of errors returned by this crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure the library can report. Trace corruption and API misuse
/// are not recoverable; a consumer is expected to give up on the trace.
#[derive(Debug, Error)]
pub enum Error {
    /// The trace file or the decompression pipe could not be opened.
    #[error("failed to open trace file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on trace stream")]
    Io(#[from] io::Error),

    /// The stream ended inside a record: a torn packet, a torn
    /// dependency array, or a torn header.
    #[error("unexpectedly reached end of trace stream, perhaps corrupt")]
    EofDuringRecord,

    /// The header's magic number did not match on a little-endian host.
    #[error("invalid trace file: bad magic {magic:#010x}")]
    BadMagic { magic: u32 },

    /// The on-disk format is little-endian only.
    #[error("only little endian architectures are currently supported")]
    UnsupportedArch,

    #[error("trace file is unsupported version: {version}")]
    UnsupportedVersion { version: f32 },

    #[error("trace file notes are implausibly large: {length} bytes")]
    OversizedNotes { length: u32 },

    #[error("trace file region table is implausibly large: {count} regions")]
    OversizedRegionTable { count: u32 },

    /// Writer-side: the benchmark name must fit in its fixed field with
    /// a trailing NUL.
    #[error("benchmark name does not fit in {limit} bytes: {name:?}")]
    BenchmarkNameTooLong { name: String, limit: usize },

    #[error("trace file must be opened before this operation")]
    NotOpen,

    #[error("cannot track the cleared packets list when dependencies are turned off")]
    DependenciesDisabled,

    #[error("cannot turn off dependencies while tracking the cleared packets list")]
    TrackingEnabled,

    /// Region index past the header's region table.
    #[error("no region {index} in trace header ({count} regions)")]
    InvalidRegion { index: usize, count: usize },

    /// A retired packet named a dependent with no registry node.
    #[error("failed to find dependency node for packet {id}")]
    MissingDependencyNode { id: u32 },

    #[error("invalid reference count on dependency node {id} while decrementing")]
    RefCountUnderflow { id: u32 },

    /// The self-throttle target cycle wrapped past `u64::MAX`.
    #[error("read-ahead target overflowed from cycle {cycle}")]
    ReadAheadOverflow { cycle: u64 },
}
