//! Error types for the connectivity store.

use thiserror::Error;

/// Result type for connectivity operations.
pub type Result<T> = std::result::Result<T, ConnectionsError>;

/// Errors raised by [`crate::Connections`].
///
/// Precondition-violation variants (everything except [`ConnectionsError::Io`]
/// and [`ConnectionsError::Malformed`]) indicate a programmer error: the store
/// makes no attempt to recover and does not expect callers to retry. They are
/// returned rather than panicked on so that embedding applications can report
/// them without an unhandled-panic abort.
#[derive(Error, Debug)]
pub enum ConnectionsError {
    /// Operated on a segment identifier that was never issued or has since
    /// been destroyed.
    #[error("unknown or destroyed segment {segment}")]
    UnknownSegment {
        /// The offending segment identifier, as its raw value.
        segment: u32,
    },

    /// Operated on a synapse identifier that was never issued, or has since
    /// been destroyed while its owning segment is still alive.
    #[error("unknown or destroyed synapse {synapse}")]
    UnknownSynapse {
        /// The offending synapse identifier, as its raw value.
        synapse: u32,
    },

    /// A destroy was requested against a handle whose entity is already gone.
    #[error("handle already destroyed: {kind} {id}")]
    DestroyedHandle {
        /// `"segment"` or `"synapse"`.
        kind: &'static str,
        /// The offending identifier, as its raw value.
        id: u32,
    },

    /// A presynaptic (or owning) cell index fell outside `[0, numCells)`.
    #[error("cell {cell} out of range (numCells = {num_cells})")]
    CellOutOfRange {
        /// The offending cell index.
        cell: u32,
        /// The store's configured cell count.
        num_cells: usize,
    },

    /// An activity-kernel output buffer was shorter than
    /// [`crate::Connections::segment_flat_list_length`].
    #[error("output buffer too short: got {got}, need at least {needed}")]
    ShortOutputBuffer {
        /// The buffer length supplied by the caller.
        got: usize,
        /// The minimum required length.
        needed: usize,
    },

    /// `createSynapse` was asked to create a second synapse on the same
    /// segment from the same presynaptic cell.
    #[error("segment {segment} already has a synapse from presynaptic cell {presynaptic_cell}")]
    DuplicateSynapse {
        /// The segment identifier, as its raw value.
        segment: u32,
        /// The presynaptic cell already wired into that segment.
        presynaptic_cell: u32,
    },

    /// I/O error encountered while saving or loading a snapshot.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Invalid magic number at the start of a snapshot.
    #[cfg(feature = "serialize")]
    #[error("invalid snapshot magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected magic number.
        expected: [u8; 4],
        /// Found magic number.
        found: [u8; 4],
    },

    /// Snapshot checksum did not match its payload.
    #[cfg(feature = "serialize")]
    #[error("snapshot checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum recorded in the snapshot.
        expected: u32,
        /// Checksum computed over the decoded payload.
        computed: u32,
    },

    /// A snapshot was structurally invalid (truncated, or otherwise could
    /// not be decoded into a consistent store).
    #[error("malformed snapshot: {reason}")]
    Malformed {
        /// Human-readable description of what was wrong.
        reason: String,
    },
}

impl ConnectionsError {
    /// Construct a [`ConnectionsError::Malformed`] from any displayable reason.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}
