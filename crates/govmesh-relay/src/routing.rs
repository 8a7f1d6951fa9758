//! Reverse-path delivery
//!
//! Responses carry the route of the request they answer and travel back
//! along it without any per-hop state. Each hop works out where to send a
//! response by scanning the route from the front: the originator sits at
//! index 0, the hop that should receive the response next is the last
//! entry this node can still reach before the route passes through a peer
//! it cannot.

use govmesh_core::{LocalIdentity, PeerDirectory, PeerId, PeerLink};
use tracing::trace;

/// Where a response goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseHop {
    /// This node originated the request
    Deliver,
    /// Forward unchanged over this channel
    Forward(PeerLink),
    /// No usable hop on the route
    DeadEnd,
}

/// Decide the next hop back along `route`.
///
/// Own identities are never resolvable. The scan stops at the first
/// unresolvable entry that follows a resolvable one and returns the
/// resolvable entry before it.
pub async fn next_hop_back<D>(
    route: &[PeerId],
    identity: &LocalIdentity,
    directory: &D,
) -> ReverseHop
where
    D: PeerDirectory + ?Sized,
{
    match route.first() {
        None => return ReverseHop::DeadEnd,
        Some(origin) if identity.contains(origin) => return ReverseHop::Deliver,
        Some(_) => {}
    }

    let mut last_resolvable: Option<PeerLink> = None;
    for hop in route {
        let link = if identity.contains(hop) {
            None
        } else {
            directory.resolve(hop).await
        };
        match (link, last_resolvable.take()) {
            (Some(link), _) => last_resolvable = Some(link),
            (None, Some(previous)) => {
                trace!(next = %previous.remote, stop = %hop, "reverse scan found next hop");
                return ReverseHop::Forward(previous);
            }
            (None, None) => {}
        }
    }

    ReverseHop::DeadEnd
}
