//! # Domain Registry
//!
//! Lookup table from routing id to domain, built once at startup.

use crate::domain::{Domain, DomainId, RelayError};
use std::collections::HashMap;

/// Registered domains in registration order.
#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: Vec<Domain>,
    by_id: HashMap<DomainId, usize>,
}

impl DomainRegistry {
    /// Build a registry, rejecting duplicate ids or names.
    pub fn new(domains: Vec<Domain>) -> Result<Self, RelayError> {
        let mut by_id = HashMap::with_capacity(domains.len());

        for (index, domain) in domains.iter().enumerate() {
            if by_id.insert(domain.id, index).is_some() {
                return Err(RelayError::DuplicateDomain {
                    domain: domain.id.to_string(),
                });
            }
            if domains[..index].iter().any(|d| d.name == domain.name) {
                return Err(RelayError::DuplicateDomain {
                    domain: domain.name.clone(),
                });
            }
        }

        Ok(Self { domains, by_id })
    }

    /// Resolve a routing id.
    pub fn resolve(&self, id: DomainId) -> Result<&Domain, RelayError> {
        self.by_id
            .get(&id)
            .map(|&index| &self.domains[index])
            .ok_or(RelayError::UnknownDomain { domain: id })
    }

    /// Resolve a human label.
    pub fn resolve_name(&self, name: &str) -> Result<&Domain, RelayError> {
        self.domains
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| RelayError::UnknownDomainName(name.to_string()))
    }

    /// All domains, in registration order.
    pub fn all(&self) -> &[Domain] {
        &self.domains
    }

    /// All routing ids, in registration order.
    pub fn ids(&self) -> Vec<DomainId> {
        self.domains.iter().map(|d| d.id).collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: DomainId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Number of registered domains.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether no domain is registered.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}
