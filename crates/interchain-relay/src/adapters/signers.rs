//! Static Signer Adapter
//!
//! Implements `SignerProvider` from a fixed map populated by the key
//! provider before relaying starts.

use crate::domain::{DomainId, Signer};
use crate::ports::outbound::SignerProvider;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Map-backed signer provider.
///
/// Signers may be replaced at runtime (key rotation); submissions always use
/// the signer current at submission time.
#[derive(Default)]
pub struct StaticSigners {
    signers: RwLock<HashMap<DomainId, Signer>>,
}

impl StaticSigners {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `signer` on every listed domain.
    pub fn shared(domains: &[DomainId], signer: Signer) -> Self {
        let provider = Self::new();
        for domain in domains {
            provider.set(*domain, signer.clone());
        }
        provider
    }

    /// Set or replace the signer for `domain`.
    pub fn set(&self, domain: DomainId, signer: Signer) {
        self.signers.write().insert(domain, signer);
    }

    /// Remove the signer for `domain`.
    pub fn remove(&self, domain: DomainId) -> Option<Signer> {
        self.signers.write().remove(&domain)
    }
}

impl SignerProvider for StaticSigners {
    fn signer(&self, domain: DomainId) -> Option<Signer> {
        self.signers.read().get(&domain).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;

    #[test]
    fn test_shared_signer() {
        let signer = Signer::new(Address::repeat_byte(1), "deployer");
        let provider = StaticSigners::shared(&[DomainId(1), DomainId(2)], signer.clone());

        assert_eq!(provider.signer(DomainId(1)), Some(signer.clone()));
        assert_eq!(provider.signer(DomainId(2)), Some(signer));
        assert_eq!(provider.signer(DomainId(3)), None);
    }

    #[test]
    fn test_rotation_and_removal() {
        let provider = StaticSigners::new();
        provider.set(DomainId(1), Signer::new(Address::repeat_byte(1), "old"));
        provider.set(DomainId(1), Signer::new(Address::repeat_byte(2), "new"));

        assert_eq!(provider.signer(DomainId(1)).unwrap().label, "new");
        assert!(provider.remove(DomainId(1)).is_some());
        assert!(provider.signer(DomainId(1)).is_none());
    }
}
