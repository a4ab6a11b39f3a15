//! Routing of argument fragments to open tool calls.
//!
//! The contract is index-based: a fragment names the block index it belongs
//! to. Some providers drop the index on continuation deltas, so two fallbacks
//! exist as a compatibility quirk: the only open tool call, then the most
//! recently opened one. Every fallback use is logged at `warn` so provider
//! drift shows up in logs instead of being masked.

use std::collections::{HashMap, HashSet};

use super::PendingCall;
use crate::error::ProtocolViolation;

/// Returns the position in `open` that receives a fragment for `index`.
pub(super) fn route(
    index: Option<usize>,
    open: &[PendingCall],
    index_to_id: &HashMap<usize, String>,
    closed: &HashSet<usize>,
) -> Result<usize, ProtocolViolation> {
    if let Some(index) = index {
        if closed.contains(&index) {
            return Err(ProtocolViolation::DeltaAfterClose { index });
        }
        if let Some(pos) = index_to_id
            .get(&index)
            .and_then(|id| open.iter().position(|c| &c.invocation.id == id))
        {
            return Ok(pos);
        }
    }

    match open {
        [] => Err(ProtocolViolation::UnresolvableDelta { index }),
        [only] => {
            tracing::warn!(
                ?index,
                call_id = %only.invocation.id,
                "argument delta routed to the only open tool call"
            );
            Ok(0)
        }
        [.., last] => {
            tracing::warn!(
                ?index,
                call_id = %last.invocation.id,
                open = open.len(),
                "argument delta routed to the most recently opened tool call"
            );
            Ok(open.len() - 1)
        }
    }
}
