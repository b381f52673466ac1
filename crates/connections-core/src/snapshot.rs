//! Snapshot codec (§6): `save`/`load` with the round-trip contract
//! `load(save(x)) == x`.
//!
//! The concrete byte format is not part of the specification; this one is
//! modeled on the lineage's binary-schema convention (a four-byte magic tag
//! followed by a version and a CRC32 checksum, see `crc32fast`/magic-number
//! use in the storage layer) wrapped around a `bincode`-encoded payload.
//! Destroyed-identifier free-lists are not preserved — only live segments
//! and synapses are written — which the specification explicitly leaves
//! implementation-defined.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionsError, Result};
use crate::store::{Connections, ConnectionsConfig};

/// Magic number identifying a `Connections` snapshot: `b"HCON"`.
pub const MAGIC: [u8; 4] = *b"HCON";

/// Snapshot format version, bumped if the payload shape changes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotSynapse {
    presynaptic_cell: u32,
    permanence: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotSegment {
    cell: u32,
    synapses: Vec<SnapshotSynapse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotPayload {
    num_cells: usize,
    connection_threshold: f32,
    segments: Vec<SnapshotSegment>,
}

impl Connections {
    fn to_payload(&self) -> SnapshotPayload {
        let mut segments = Vec::with_capacity(self.num_live_segments);
        for record in &self.segments {
            if record.destroyed {
                continue;
            }
            let synapses = record
                .synapses
                .iter()
                .map(|&y| {
                    let s = &self.synapses[y.raw() as usize];
                    SnapshotSynapse {
                        presynaptic_cell: s.presynaptic_cell,
                        permanence: s.permanence,
                    }
                })
                .collect();
            segments.push(SnapshotSegment {
                cell: record.cell,
                synapses,
            });
        }
        SnapshotPayload {
            num_cells: self.num_cells,
            connection_threshold: self.connection_threshold,
            segments,
        }
    }

    fn from_payload(payload: SnapshotPayload) -> Result<Self> {
        let mut store = Connections::with_config(ConnectionsConfig {
            num_cells: payload.num_cells,
            connection_threshold: payload.connection_threshold,
        });
        for segment in payload.segments {
            let s = store.create_segment(segment.cell)?;
            for synapse in segment.synapses {
                store.create_synapse(s, synapse.presynaptic_cell, synapse.permanence)?;
            }
        }
        Ok(store)
    }

    /// Serialize the full observable state of this store to `sink`.
    pub fn save<W: Write>(&self, mut sink: W) -> Result<()> {
        let payload = self.to_payload();
        let body = bincode::serialize(&payload)
            .map_err(|e| ConnectionsError::malformed(format!("encode failure: {e}")))?;
        let checksum = crc32fast::hash(&body);

        sink.write_all(&MAGIC)?;
        sink.write_all(&FORMAT_VERSION.to_le_bytes())?;
        sink.write_all(&checksum.to_le_bytes())?;
        sink.write_all(&(body.len() as u64).to_le_bytes())?;
        sink.write_all(&body)?;
        log::debug!(
            "saved snapshot: {} live segments, {} bytes",
            self.num_live_segments,
            body.len()
        );
        Ok(())
    }

    /// Restore a store from a snapshot produced by [`Connections::save`].
    ///
    /// On any failure — I/O error or malformed snapshot — no partially
    /// constructed state leaks back to the caller; a fresh scratch instance
    /// is built internally and only returned once it has been fully decoded.
    pub fn load<R: Read>(mut source: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ConnectionsError::InvalidMagic {
                expected: MAGIC,
                found: magic,
            });
        }

        let mut version_bytes = [0u8; 4];
        source.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != FORMAT_VERSION {
            return Err(ConnectionsError::malformed(format!(
                "unsupported snapshot version {version}, expected {FORMAT_VERSION}"
            )));
        }

        let mut checksum_bytes = [0u8; 4];
        source.read_exact(&mut checksum_bytes)?;
        let expected_checksum = u32::from_le_bytes(checksum_bytes);

        let mut len_bytes = [0u8; 8];
        source.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut body = vec![0u8; len];
        source.read_exact(&mut body)?;

        let computed_checksum = crc32fast::hash(&body);
        if computed_checksum != expected_checksum {
            return Err(ConnectionsError::ChecksumMismatch {
                expected: expected_checksum,
                computed: computed_checksum,
            });
        }

        let payload: SnapshotPayload = bincode::deserialize(&body)
            .map_err(|e| ConnectionsError::malformed(format!("decode failure: {e}")))?;
        Self::from_payload(payload)
    }

    /// Replace `self` with the store decoded from `source`, leaving `self`
    /// untouched if decoding fails anywhere along the way.
    pub fn load_replace<R: Read>(&mut self, source: R) -> Result<()> {
        let loaded = Self::load(source)?;
        *self = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn populated_store() -> Connections {
        let mut conns = Connections::new(64);
        let a = conns.create_segment(10).unwrap();
        conns.create_synapse(a, 1, 0.2).unwrap();
        conns.create_synapse(a, 2, 0.9).unwrap();
        let b = conns.create_segment(20).unwrap();
        conns.create_synapse(b, 3, 0.5).unwrap();
        // Exercise a destroy so the snapshot must skip tombstones correctly.
        let c = conns.create_segment(30).unwrap();
        conns.destroy_segment(c).unwrap();
        conns
    }

    #[test]
    fn save_then_load_round_trips() {
        let original = populated_store();
        let mut bytes = Vec::new();
        original.save(&mut bytes).unwrap();

        let loaded = Connections::load(bytes.as_slice()).unwrap();
        assert_eq!(original, loaded);
    }

    #[test]
    fn load_rejects_wrong_magic() {
        let mut bytes = Vec::new();
        populated_store().save(&mut bytes).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Connections::load(bytes.as_slice()),
            Err(ConnectionsError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn load_rejects_corrupted_checksum() {
        let mut bytes = Vec::new();
        populated_store().save(&mut bytes).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            Connections::load(bytes.as_slice()),
            Err(ConnectionsError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn failed_load_replace_leaves_original_store_untouched() {
        let mut store = populated_store();
        let before = Connections::new(64);
        let mut corrupt = Vec::new();
        store.save(&mut corrupt).unwrap();
        corrupt[0] = b'X';

        let err = store.load_replace(corrupt.as_slice());
        assert!(err.is_err());
        // `store` must still equal its pre-attempt self, not the scratch
        // default it would have become had the swap happened unconditionally.
        assert_ne!(store, before);
        assert_eq!(store, populated_store());
    }

    #[test]
    fn activity_survives_a_round_trip() {
        let original = populated_store();
        let mut bytes = Vec::new();
        original.save(&mut bytes).unwrap();
        let loaded = Connections::load(bytes.as_slice()).unwrap();

        let len = loaded.segment_flat_list_length();
        let mut connected = vec![0u32; len];
        let mut potential = vec![0u32; len];
        let input: HashSet<u32> = [2].into_iter().collect();
        loaded
            .compute_activity(&mut connected, &mut potential, &input, 0.5)
            .unwrap();
        assert_eq!(potential.iter().sum::<u32>(), 1);
        assert_eq!(connected.iter().sum::<u32>(), 1);
    }
}
