//! The activity kernel (§4.4) and the segment↔cell mapping kernel (§4.7).
//!
//! Both kernels write into caller-owned output buffers indexed by raw
//! identifier, sized to the relevant flat-list length — this lets a caller
//! amortize allocation of those buffers across repeated ticks instead of
//! allocating fresh `Vec`s on every call.

use std::collections::HashSet;

use crate::error::{ConnectionsError, Result};
use crate::ids::SegmentId;
use crate::store::Connections;

impl Connections {
    /// For each active input cell, for each synapse sourced from that cell,
    /// increment `potential_out[segment]`, and additionally increment
    /// `connected_out[segment]` if that synapse's permanence meets
    /// `threshold`.
    ///
    /// `connected_out` and `potential_out` must each be at least
    /// [`Connections::segment_flat_list_length`] long and are assumed
    /// zero-initialized by the caller; this kernel only ever adds to them.
    /// Cost is linear in the number of reverse-index entries touched by
    /// `input`, independent of the number of quiescent segments.
    pub fn compute_activity(
        &self,
        connected_out: &mut [u32],
        potential_out: &mut [u32],
        input: &HashSet<u32>,
        threshold: f32,
    ) -> Result<()> {
        let needed = self.segment_flat_list_length();
        if connected_out.len() < needed {
            return Err(ConnectionsError::ShortOutputBuffer {
                got: connected_out.len(),
                needed,
            });
        }
        if potential_out.len() < needed {
            return Err(ConnectionsError::ShortOutputBuffer {
                got: potential_out.len(),
                needed,
            });
        }

        for &cell in input {
            self.check_cell(cell)?;
            for &synapse in &self.reverse[cell as usize] {
                let record = &self.synapses[synapse.raw() as usize];
                let segment = record.segment.raw() as usize;
                potential_out[segment] += 1;
                if record.permanence >= threshold {
                    connected_out[segment] += 1;
                }
            }
        }
        log::trace!(
            "computeActivity over {} input cells, threshold {threshold}",
            input.len()
        );
        Ok(())
    }

    /// For each index `i`, `out[i] = cellForSegment(segments[i])`. Every
    /// segment in `segments` must be live; the first non-live segment
    /// encountered is a fatal precondition error and leaves `out` partially
    /// written.
    pub fn map_segments_to_cells(&self, segments: &[SegmentId], out: &mut [u32]) -> Result<()> {
        if out.len() < segments.len() {
            return Err(ConnectionsError::ShortOutputBuffer {
                got: out.len(),
                needed: segments.len(),
            });
        }
        for (i, &segment) in segments.iter().enumerate() {
            out[i] = self.cell_for_segment(segment)?;
        }
        Ok(())
    }
}
