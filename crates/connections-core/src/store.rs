//! The `Connections` store: forward store (§4.2), reverse index (§4.3), and
//! structural/learning mutators (§4.5, §4.6).

use std::collections::HashSet;

use smallvec::SmallVec;

use crate::error::{ConnectionsError, Result};
use crate::events::{ConnectionsEventHandler, Observers, SubscriptionToken};
use crate::ids::{Allocator, SegmentId, SynapseId};

const EPSILON: f32 = 1e-7;

fn clamp_permanence(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Small inline capacity before a cell's segment list (or a segment's synapse
/// list, or a reverse bucket) spills to the heap. Dendritic segments and
/// reverse buckets are typically small; this avoids an allocation per cell
/// for the common case.
type SmallIdVec<T> = SmallVec<[T; 4]>;

#[derive(Debug, Clone)]
pub(crate) struct SegmentRecord {
    pub(crate) cell: u32,
    pub(crate) synapses: SmallIdVec<SynapseId>,
    pub(crate) destroyed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapseData {
    /// The presynaptic cell this synapse's source is wired to.
    pub presynaptic_cell: u32,
    /// The synapse's permanence, always in `[0, 1]`.
    pub permanence: f32,
}

#[derive(Debug, Clone)]
pub(crate) struct SynapseRecord {
    pub(crate) segment: SegmentId,
    pub(crate) presynaptic_cell: u32,
    pub(crate) permanence: f32,
    pub(crate) destroyed: bool,
}

/// Typed configuration for a [`Connections`] store (§10.2).
///
/// This is not a file-loaded configuration layer — it is the in-process
/// "typed struct instead of a parameter list" convention applied to the two
/// values the store itself owns.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionsConfig {
    /// Size of the fixed cell universe.
    pub num_cells: usize,
    /// Default connection threshold, for convenience callers that always use
    /// the same cutoff with [`Connections::compute_activity`].
    pub connection_threshold: f32,
}

impl ConnectionsConfig {
    /// Construct a config with a default connection threshold of `0.5`.
    pub fn new(num_cells: usize) -> Self {
        Self {
            num_cells,
            connection_threshold: 0.5,
        }
    }
}

/// A sparse synaptic connectivity store over a fixed universe of `numCells`
/// cells (§3).
///
/// `Connections` owns the full three-level cell → segment → synapse graph. It
/// is not internally synchronized (§5): concurrent read-only queries on an
/// unchanging store are safe, but concurrent mutation is the caller's
/// responsibility.
pub struct Connections {
    pub(crate) num_cells: usize,
    pub(crate) connection_threshold: f32,

    // Forward store (§4.2): per cell, its live segments in creation order.
    pub(crate) cells: Vec<SmallIdVec<SegmentId>>,
    pub(crate) segments: Vec<SegmentRecord>,
    pub(crate) segment_alloc: Allocator,
    pub(crate) num_live_segments: usize,

    pub(crate) synapses: Vec<SynapseRecord>,
    pub(crate) synapse_alloc: Allocator,
    pub(crate) num_live_synapses: usize,

    // Reverse index (§4.3): per presynaptic cell, the synapses sourced there.
    pub(crate) reverse: Vec<SmallIdVec<SynapseId>>,

    pub(crate) observers: Observers,
}

impl Connections {
    /// Create an empty store over `num_cells` cells.
    pub fn new(num_cells: usize) -> Self {
        Self::with_config(ConnectionsConfig::new(num_cells))
    }

    /// Create an empty store from a [`ConnectionsConfig`].
    pub fn with_config(config: ConnectionsConfig) -> Self {
        Self {
            num_cells: config.num_cells,
            connection_threshold: config.connection_threshold,
            cells: vec![SmallIdVec::new(); config.num_cells],
            segments: Vec::new(),
            segment_alloc: Allocator::new(),
            num_live_segments: 0,
            synapses: Vec::new(),
            synapse_alloc: Allocator::new(),
            num_live_synapses: 0,
            reverse: vec![SmallIdVec::new(); config.num_cells],
            observers: Observers::default(),
        }
    }

    /// Size of the fixed cell universe this store was constructed with.
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// The default connection threshold carried in this store's config.
    pub fn connection_threshold(&self) -> f32 {
        self.connection_threshold
    }

    pub(crate) fn check_cell(&self, cell: u32) -> Result<()> {
        if (cell as usize) >= self.num_cells {
            return Err(ConnectionsError::CellOutOfRange {
                cell,
                num_cells: self.num_cells,
            });
        }
        Ok(())
    }

    fn live_segment(&self, segment: SegmentId) -> Result<&SegmentRecord> {
        self.segments
            .get(segment.raw() as usize)
            .filter(|record| !record.destroyed)
            .ok_or(ConnectionsError::UnknownSegment {
                segment: segment.raw(),
            })
    }

    fn live_synapse(&self, synapse: SynapseId) -> Result<&SynapseRecord> {
        self.synapses
            .get(synapse.raw() as usize)
            .filter(|record| !record.destroyed)
            .ok_or(ConnectionsError::UnknownSynapse {
                synapse: synapse.raw(),
            })
    }

    // ---- Forward store queries (§4.2) ----------------------------------

    /// Live segment identifiers on `cell`, in creation order.
    pub fn segments_for_cell(&self, cell: u32) -> Result<&[SegmentId]> {
        self.check_cell(cell)?;
        Ok(&self.cells[cell as usize])
    }

    /// Live synapse identifiers on `segment`, in creation order.
    pub fn synapses_for_segment(&self, segment: SegmentId) -> Result<&[SynapseId]> {
        Ok(&self.live_segment(segment)?.synapses)
    }

    /// The cell `segment` was created on.
    pub fn cell_for_segment(&self, segment: SegmentId) -> Result<u32> {
        Ok(self.live_segment(segment)?.cell)
    }

    /// The segment `synapse` was created on.
    pub fn segment_for_synapse(&self, synapse: SynapseId) -> Result<SegmentId> {
        Ok(self.live_synapse(synapse)?.segment)
    }

    /// The presynaptic cell and permanence of `synapse`.
    pub fn data_for_synapse(&self, synapse: SynapseId) -> Result<SynapseData> {
        let record = self.live_synapse(synapse)?;
        Ok(SynapseData {
            presynaptic_cell: record.presynaptic_cell,
            permanence: record.permanence,
        })
    }

    /// Number of live segments across the whole store.
    pub fn num_segments(&self) -> usize {
        self.num_live_segments
    }

    /// Number of live synapses across the whole store.
    pub fn num_synapses(&self) -> usize {
        self.num_live_synapses
    }

    /// Number of live synapses on a single segment.
    pub fn num_synapses_on_segment(&self, segment: SegmentId) -> Result<usize> {
        Ok(self.live_segment(segment)?.synapses.len())
    }

    /// One past the largest segment identifier ever issued — the valid index
    /// range for activity-kernel output buffers (§4.1, §4.4).
    pub fn segment_flat_list_length(&self) -> usize {
        self.segment_alloc.flat_list_length()
    }

    /// One past the largest synapse identifier ever issued.
    pub fn synapse_flat_list_length(&self) -> usize {
        self.synapse_alloc.flat_list_length()
    }

    // ---- Structural mutators (§4.6) -------------------------------------

    /// Create a new segment on `cell`.
    pub fn create_segment(&mut self, cell: u32) -> Result<SegmentId> {
        self.check_cell(cell)?;

        let raw = self.segment_alloc.allocate();
        let record = SegmentRecord {
            cell,
            synapses: SmallIdVec::new(),
            destroyed: false,
        };
        if (raw as usize) < self.segments.len() {
            self.segments[raw as usize] = record;
        } else {
            debug_assert_eq!(raw as usize, self.segments.len());
            self.segments.push(record);
        }
        let segment = SegmentId::new(raw);
        self.cells[cell as usize].push(segment);
        self.num_live_segments += 1;

        log::trace!("created segment {segment} on cell {cell}");
        self.observers.fire_create_segment(segment);
        Ok(segment)
    }

    /// Create a new synapse on `segment` from `presynaptic_cell` with the
    /// given `permanence` (clamped to `[0, 1]`).
    ///
    /// Rejects a second synapse from the same presynaptic cell onto the same
    /// segment with [`ConnectionsError::DuplicateSynapse`] (§9 open-question
    /// decision).
    pub fn create_synapse(
        &mut self,
        segment: SegmentId,
        presynaptic_cell: u32,
        permanence: f32,
    ) -> Result<SynapseId> {
        self.check_cell(presynaptic_cell)?;
        self.live_segment(segment)?;

        let already_wired = self.segments[segment.raw() as usize]
            .synapses
            .iter()
            .any(|&y| self.synapses[y.raw() as usize].presynaptic_cell == presynaptic_cell);
        if already_wired {
            return Err(ConnectionsError::DuplicateSynapse {
                segment: segment.raw(),
                presynaptic_cell,
            });
        }

        let permanence = clamp_permanence(permanence);
        let raw = self.synapse_alloc.allocate();
        let record = SynapseRecord {
            segment,
            presynaptic_cell,
            permanence,
            destroyed: false,
        };
        if (raw as usize) < self.synapses.len() {
            self.synapses[raw as usize] = record;
        } else {
            debug_assert_eq!(raw as usize, self.synapses.len());
            self.synapses.push(record);
        }
        let synapse = SynapseId::new(raw);
        self.segments[segment.raw() as usize].synapses.push(synapse);
        self.reverse[presynaptic_cell as usize].push(synapse);
        self.num_live_synapses += 1;

        log::trace!(
            "created synapse {synapse} on segment {segment} from cell {presynaptic_cell} \
             (permanence {permanence})"
        );
        self.observers.fire_create_synapse(synapse);
        Ok(synapse)
    }

    /// Destroy `synapse`: removes it from its segment's synapse list and its
    /// source's reverse bucket, and releases its identifier.
    ///
    /// Idempotent if the owning segment has already been destroyed (§4.6);
    /// otherwise, destroying an already-destroyed synapse is a precondition
    /// violation.
    pub fn destroy_synapse(&mut self, synapse: SynapseId) -> Result<()> {
        let Some(record) = self.synapses.get(synapse.raw() as usize) else {
            return Err(ConnectionsError::UnknownSynapse {
                synapse: synapse.raw(),
            });
        };
        if record.destroyed {
            if self.segments[record.segment.raw() as usize].destroyed {
                return Ok(());
            }
            log::warn!("destroySynapse on already-destroyed synapse {synapse}");
            return Err(ConnectionsError::DestroyedHandle {
                kind: "synapse",
                id: synapse.raw(),
            });
        }

        let segment = record.segment;
        self.segments[segment.raw() as usize]
            .synapses
            .retain(|&y| y != synapse);
        self.destroy_synapse_unchecked(synapse);
        Ok(())
    }

    /// Destroy `synapse` without touching its owning segment's synapse list.
    ///
    /// The caller must have already removed `synapse` from that list (or be
    /// discarding the segment wholesale) *before* calling this, since it
    /// fires `onDestroySynapse` and notifications must see both the forward
    /// list and the reverse index already consistent (§5).
    pub(crate) fn destroy_synapse_unchecked(&mut self, synapse: SynapseId) {
        let record = &mut self.synapses[synapse.raw() as usize];
        record.destroyed = true;
        let presynaptic_cell = record.presynaptic_cell;

        self.reverse[presynaptic_cell as usize].retain(|&y| y != synapse);
        self.synapse_alloc.release(synapse.raw());
        self.num_live_synapses -= 1;

        log::trace!("destroyed synapse {synapse}");
        self.observers.fire_destroy_synapse(synapse);
    }

    /// Destroy `segment` and, as a side effect, every remaining live synapse
    /// on it.
    pub fn destroy_segment(&mut self, segment: SegmentId) -> Result<()> {
        let Some(record) = self.segments.get(segment.raw() as usize) else {
            return Err(ConnectionsError::UnknownSegment {
                segment: segment.raw(),
            });
        };
        if record.destroyed {
            return Err(ConnectionsError::DestroyedHandle {
                kind: "segment",
                id: segment.raw(),
            });
        }

        let cell = record.cell;
        let synapses = std::mem::take(&mut self.segments[segment.raw() as usize].synapses);
        for synapse in synapses {
            self.destroy_synapse_unchecked(synapse);
        }

        self.segments[segment.raw() as usize].destroyed = true;
        self.cells[cell as usize].retain(|&s| s != segment);
        self.segment_alloc.release(segment.raw());
        self.num_live_segments -= 1;

        log::trace!("destroyed segment {segment} on cell {cell}");
        self.observers.fire_destroy_segment(segment);
        Ok(())
    }

    // ---- Learning mutators (§4.5) ---------------------------------------

    /// Overwrite `synapse`'s permanence with `clamp(value, 0, 1)`. Never
    /// inserts or removes edges, regardless of whether the new value crosses
    /// a connection threshold.
    pub fn update_synapse_permanence(&mut self, synapse: SynapseId, value: f32) -> Result<()> {
        self.live_synapse(synapse)?;
        let permanence = clamp_permanence(value);
        self.synapses[synapse.raw() as usize].permanence = permanence;
        self.observers
            .fire_update_synapse_permanence(synapse, permanence);
        Ok(())
    }

    /// Per-synapse learning rule: for each synapse on `segment`, increment
    /// its permanence if its source is in `input`, otherwise decrement it,
    /// clamping to `[0, 1]`. Fires one update notification per synapse
    /// touched.
    pub fn adapt_segment(
        &mut self,
        segment: SegmentId,
        input: &HashSet<u32>,
        increment: f32,
        decrement: f32,
    ) -> Result<()> {
        self.live_segment(segment)?;

        // Snapshot the synapse list: the loop only updates permanences, so
        // the list itself cannot change mid-iteration, but borrowing it by
        // value sidesteps holding an immutable borrow of `self` across the
        // mutable writes below.
        let synapses = self.segments[segment.raw() as usize].synapses.clone();
        for synapse in synapses {
            let record = &mut self.synapses[synapse.raw() as usize];
            let delta = if input.contains(&record.presynaptic_cell) {
                increment
            } else {
                -decrement
            };
            let permanence = clamp_permanence(record.permanence + delta);
            record.permanence = permanence;
            self.observers
                .fire_update_synapse_permanence(synapse, permanence);
        }
        log::trace!("adapted segment {segment} against {} active cells", input.len());
        Ok(())
    }

    // ---- Observers (§4.6) ------------------------------------------------

    /// Register `handler`, taking ownership of it. Returns an opaque token
    /// for later [`Connections::unsubscribe`].
    pub fn subscribe(&mut self, handler: Box<dyn ConnectionsEventHandler>) -> SubscriptionToken {
        self.observers.subscribe(handler)
    }

    /// Unregister the handler identified by `token`, dropping it.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) {
        self.observers.unsubscribe(token);
    }
}

impl std::fmt::Debug for Connections {
    // Observers hold trait objects and aren't `Debug`; print the structural
    // summary that matters for diagnosing a failed equality assertion.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connections")
            .field("num_cells", &self.num_cells)
            .field("num_segments", &self.num_live_segments)
            .field("num_synapses", &self.num_live_synapses)
            .finish()
    }
}

impl PartialEq for Connections {
    /// Structural equality: same cell count, same live segment/synapse graph
    /// (order within each cell and segment list matters), same permanences
    /// within `1e-7` (§6). Identifiers themselves are not compared — a
    /// freshly loaded store need not reuse the same raw IDs as the store it
    /// was saved from.
    fn eq(&self, other: &Self) -> bool {
        if self.num_cells != other.num_cells {
            return false;
        }
        for cell in 0..self.num_cells {
            let a = &self.cells[cell];
            let b = &other.cells[cell];
            if a.len() != b.len() {
                return false;
            }
            for (&sa, &sb) in a.iter().zip(b.iter()) {
                let ra = &self.segments[sa.raw() as usize];
                let rb = &other.segments[sb.raw() as usize];
                if ra.synapses.len() != rb.synapses.len() {
                    return false;
                }
                for (&ya, &yb) in ra.synapses.iter().zip(rb.synapses.iter()) {
                    let da = &self.synapses[ya.raw() as usize];
                    let db = &other.synapses[yb.raw() as usize];
                    if da.presynaptic_cell != db.presynaptic_cell {
                        return false;
                    }
                    if (da.permanence - db.permanence).abs() > EPSILON {
                        return false;
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_query_segments_for_cell() {
        let mut conns = Connections::new(1024);
        let s1 = conns.create_segment(10).unwrap();
        let s2 = conns.create_segment(10).unwrap();
        assert_eq!(conns.segments_for_cell(10).unwrap(), &[s1, s2]);
        assert_eq!(conns.cell_for_segment(s1).unwrap(), 10);
    }

    #[test]
    fn destroying_a_synapse_does_not_invalidate_siblings() {
        let mut conns = Connections::new(1024);
        let g = conns.create_segment(13).unwrap();
        let mut handles = Vec::new();
        for cell in 201..206u32 {
            handles.push(conns.create_synapse(g, cell, 0.85).unwrap());
        }
        let (y1, y3, y5) = (handles[0], handles[2], handles[4]);

        conns.destroy_synapse(y1).unwrap();
        assert_eq!(conns.data_for_synapse(y3).unwrap().presynaptic_cell, 203);

        conns.destroy_synapse(y5).unwrap();
        assert_eq!(conns.data_for_synapse(y3).unwrap().presynaptic_cell, 203);

        let neighbor_a = conns.create_segment(11).unwrap();
        let neighbor_b = conns.create_segment(15).unwrap();
        conns.destroy_segment(neighbor_a).unwrap();
        conns.destroy_segment(neighbor_b).unwrap();

        assert_eq!(conns.synapses_for_segment(g).unwrap().len(), 3);
        assert_eq!(conns.data_for_synapse(y3).unwrap().presynaptic_cell, 203);
    }

    #[test]
    fn destroy_segment_cascades_and_is_observable_in_reverse_index() {
        let mut conns = Connections::new(4);
        let s = conns.create_segment(0).unwrap();
        let y = conns.create_synapse(s, 1, 0.6).unwrap();
        conns.destroy_segment(s).unwrap();

        assert!(conns.cell_for_segment(s).is_err());
        assert!(conns.segment_for_synapse(y).is_err());
        // destroySynapse on a synapse whose segment is already gone is a
        // no-op, not an error.
        assert!(conns.destroy_synapse(y).is_ok());
    }

    #[test]
    fn destroy_synapse_twice_on_live_segment_is_a_precondition_violation() {
        let mut conns = Connections::new(4);
        let s = conns.create_segment(0).unwrap();
        let y = conns.create_synapse(s, 1, 0.6).unwrap();
        conns.destroy_synapse(y).unwrap();
        assert!(matches!(
            conns.destroy_synapse(y),
            Err(ConnectionsError::DestroyedHandle { kind: "synapse", .. })
        ));
    }

    #[test]
    fn duplicate_presynaptic_cell_on_same_segment_is_rejected() {
        let mut conns = Connections::new(4);
        let s = conns.create_segment(0).unwrap();
        conns.create_synapse(s, 1, 0.5).unwrap();
        assert!(matches!(
            conns.create_synapse(s, 1, 0.5),
            Err(ConnectionsError::DuplicateSynapse { .. })
        ));
    }

    #[test]
    fn clamping_permanence_is_inclusive_at_both_ends() {
        let mut conns = Connections::new(4);
        let s = conns.create_segment(0).unwrap();
        let y = conns.create_synapse(s, 1, 0.34).unwrap();

        conns.update_synapse_permanence(y, -0.02).unwrap();
        assert_eq!(conns.data_for_synapse(y).unwrap().permanence, 0.0);

        conns.update_synapse_permanence(y, 1.02).unwrap();
        assert_eq!(conns.data_for_synapse(y).unwrap().permanence, 1.0);
    }

    #[test]
    fn adapt_segment_matches_the_literal_scenario() {
        let mut conns = Connections::new(8);
        let input: HashSet<u32> = [0, 3, 4, 6].into_iter().collect();

        let seg0 = conns.create_segment(0).unwrap();
        let y00 = conns.create_synapse(seg0, 0, 0.200).unwrap();
        let y01 = conns.create_synapse(seg0, 1, 0.120).unwrap();
        let y02 = conns.create_synapse(seg0, 2, 0.090).unwrap();
        let y03 = conns.create_synapse(seg0, 3, 0.060).unwrap();
        conns.adapt_segment(seg0, &input, 0.1, 0.01).unwrap();
        assert!((conns.data_for_synapse(y00).unwrap().permanence - 0.300).abs() < EPSILON);
        assert!((conns.data_for_synapse(y01).unwrap().permanence - 0.110).abs() < EPSILON);
        assert!((conns.data_for_synapse(y02).unwrap().permanence - 0.080).abs() < EPSILON);
        assert!((conns.data_for_synapse(y03).unwrap().permanence - 0.160).abs() < EPSILON);

        let seg2 = conns.create_segment(2).unwrap();
        let y2a = conns.create_synapse(seg2, 2, 0.005).unwrap();
        let y2b = conns.create_synapse(seg2, 6, 0.950).unwrap();
        conns.adapt_segment(seg2, &input, 0.1, 0.01).unwrap();
        assert_eq!(conns.data_for_synapse(y2a).unwrap().permanence, 0.0);
        assert_eq!(conns.data_for_synapse(y2b).unwrap().permanence, 1.0);
    }

    #[test]
    fn equality_ignores_raw_ids_but_not_structure() {
        let mut a = Connections::new(4);
        let sa = a.create_segment(0).unwrap();
        a.create_synapse(sa, 1, 0.5).unwrap();

        let mut b = Connections::new(4);
        // Force b's allocator to hand out a different raw segment ID than
        // a's, by creating and then destroying an unrelated segment on
        // another cell first (its live graph must end up identical to a's).
        let filler = b.create_segment(1).unwrap();
        let sb = b.create_segment(0).unwrap();
        assert_ne!(sa, sb);
        b.create_synapse(sb, 1, 0.5).unwrap();
        b.destroy_segment(filler).unwrap();

        assert_eq!(a, b);
    }
}
