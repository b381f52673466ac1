//! Structural-event observer pattern (§4.6, §9).
//!
//! The store owns each subscribed handler for the duration of its
//! subscription: `subscribe` takes ownership, `unsubscribe` drops it. Firing
//! order among multiple subscribers is subscription order, and events fire
//! only after the mutation they describe has been applied to both the
//! forward store and the reverse index.

use crate::ids::{SegmentId, SynapseId};

/// Observer for structural and learning events on a [`crate::Connections`]
/// store.
///
/// Implementors may hold external state (counters, flags, a handle back into
/// a learning algorithm) and are free to rely on `Drop` to observe
/// unsubscription, matching the scenario in the specification where a
/// handler's destructor sets an external flag.
pub trait ConnectionsEventHandler {
    /// Fired after `createSegment` has appended `segment` to its cell's list.
    fn on_create_segment(&mut self, segment: SegmentId) {
        let _ = segment;
    }

    /// Fired after `destroySegment` has removed `segment` from its cell's
    /// list and released its identifier.
    fn on_destroy_segment(&mut self, segment: SegmentId) {
        let _ = segment;
    }

    /// Fired after `createSynapse` has appended `synapse` to its segment's
    /// list and inserted it into the reverse index.
    fn on_create_synapse(&mut self, synapse: SynapseId) {
        let _ = synapse;
    }

    /// Fired after `destroySynapse` has removed `synapse` from its segment's
    /// list and the reverse index.
    fn on_destroy_synapse(&mut self, synapse: SynapseId) {
        let _ = synapse;
    }

    /// Fired after a synapse's permanence has been written, whether by
    /// `updateSynapsePermanence` or by `adaptSegment` (once per synapse
    /// touched).
    fn on_update_synapse_permanence(&mut self, synapse: SynapseId, permanence: f32) {
        let _ = (synapse, permanence);
    }
}

/// Opaque token returned by [`crate::Connections::subscribe`], passed back to
/// [`crate::Connections::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub(crate) usize);

#[derive(Default)]
pub(crate) struct Observers {
    // `None` marks an unsubscribed slot; slots are never reindexed so a
    // `SubscriptionToken` stays valid (pointing at an empty slot) after
    // `unsubscribe`.
    handlers: Vec<Option<Box<dyn ConnectionsEventHandler>>>,
}

impl Observers {
    pub(crate) fn subscribe(
        &mut self,
        handler: Box<dyn ConnectionsEventHandler>,
    ) -> SubscriptionToken {
        let token = SubscriptionToken(self.handlers.len());
        self.handlers.push(Some(handler));
        token
    }

    pub(crate) fn unsubscribe(&mut self, token: SubscriptionToken) {
        if let Some(slot) = self.handlers.get_mut(token.0) {
            // Dropping the boxed handler here is what "destroys" it.
            *slot = None;
        }
    }

    pub(crate) fn fire_create_segment(&mut self, segment: SegmentId) {
        for handler in self.handlers.iter_mut().flatten() {
            handler.on_create_segment(segment);
        }
    }

    pub(crate) fn fire_destroy_segment(&mut self, segment: SegmentId) {
        for handler in self.handlers.iter_mut().flatten() {
            handler.on_destroy_segment(segment);
        }
    }

    pub(crate) fn fire_create_synapse(&mut self, synapse: SynapseId) {
        for handler in self.handlers.iter_mut().flatten() {
            handler.on_create_synapse(synapse);
        }
    }

    pub(crate) fn fire_destroy_synapse(&mut self, synapse: SynapseId) {
        for handler in self.handlers.iter_mut().flatten() {
            handler.on_destroy_synapse(synapse);
        }
    }

    pub(crate) fn fire_update_synapse_permanence(&mut self, synapse: SynapseId, permanence: f32) {
        for handler in self.handlers.iter_mut().flatten() {
            handler.on_update_synapse_permanence(synapse, permanence);
        }
    }
}
