//! # Destination Grouping
//!
//! Splits a scan batch into per-destination delivery queues.

use crate::domain::{DispatchedMessage, DomainId};
use std::collections::HashMap;

/// Group messages by destination.
///
/// Groups appear in the order their destination was first seen, and each
/// group keeps the relative emission order of its messages.
pub fn group_by_destination(
    messages: &[DispatchedMessage],
) -> Vec<(DomainId, Vec<DispatchedMessage>)> {
    let mut index: HashMap<DomainId, usize> = HashMap::new();
    let mut groups: Vec<(DomainId, Vec<DispatchedMessage>)> = Vec::new();

    for message in messages {
        let slot = *index.entry(message.destination).or_insert_with(|| {
            groups.push((message.destination, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(message.clone());
    }

    groups
}
