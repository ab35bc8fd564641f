//! Member and provider directories
//!
//! Report generation only needs read access, expressed by the
//! [`MemberDirectory`] and [`ProviderDirectory`] lookup traits. [`Directory`]
//! is the owned, ordered implementation used by the data center.

use crate::{
    types::{Member, MemberId, Provider, ProviderId, Service, ServiceCode},
    Error, Result,
};
use std::collections::BTreeMap;

/// Read-only member lookup
pub trait MemberDirectory {
    /// Look up a member by number
    fn member(&self, id: MemberId) -> Option<&Member>;

    /// All members in ascending id order
    fn members(&self) -> Box<dyn Iterator<Item = &Member> + '_>;

    /// Look up a member, failing on unknown ids
    fn require_member(&self, id: MemberId) -> Result<&Member> {
        self.member(id).ok_or(Error::UnknownMember(id))
    }
}

/// Read-only provider lookup
pub trait ProviderDirectory {
    /// Look up a provider by number
    fn provider(&self, id: ProviderId) -> Option<&Provider>;

    /// All providers in ascending id order
    fn providers(&self) -> Box<dyn Iterator<Item = &Provider> + '_>;

    /// Look up a provider, failing on unknown ids
    fn require_provider(&self, id: ProviderId) -> Result<&Provider> {
        self.provider(id).ok_or(Error::UnknownProvider(id))
    }

    /// Look up a service in a provider's catalog
    fn require_service(&self, id: ProviderId, code: ServiceCode) -> Result<&Service> {
        self.require_provider(id)?
            .service(code)
            .ok_or(Error::UnknownService { provider: id, code })
    }
}

/// Owned member and provider registry, iterated in ascending id order
#[derive(Debug, Clone, Default)]
pub struct Directory {
    members: BTreeMap<MemberId, Member>,
    providers: BTreeMap<ProviderId, Provider>,
}

impl Directory {
    /// Create empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member
    pub fn add_member(&mut self, member: Member) -> Result<()> {
        if self.members.contains_key(&member.id) {
            return Err(Error::DuplicateId(format!("member {}", member.id)));
        }
        tracing::debug!(member = %member.id, "Registered member");
        self.members.insert(member.id, member);
        Ok(())
    }

    /// Remove a member
    pub fn remove_member(&mut self, id: MemberId) -> Option<Member> {
        self.members.remove(&id)
    }

    /// Mutable member access (status and address changes)
    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.get_mut(&id)
    }

    /// Register a provider
    pub fn add_provider(&mut self, provider: Provider) -> Result<()> {
        if self.providers.contains_key(&provider.id) {
            return Err(Error::DuplicateId(format!("provider {}", provider.id)));
        }
        tracing::debug!(provider = %provider.id, "Registered provider");
        self.providers.insert(provider.id, provider);
        Ok(())
    }

    /// Remove a provider
    pub fn remove_provider(&mut self, id: ProviderId) -> Option<Provider> {
        self.providers.remove(&id)
    }

    /// Mutable provider access (catalog and address changes)
    pub fn provider_mut(&mut self, id: ProviderId) -> Option<&mut Provider> {
        self.providers.get_mut(&id)
    }

    /// First provider whose local clock cannot move `seconds` forward
    pub fn provider_clock_overflow(&self, seconds: u64) -> Option<ProviderId> {
        self.providers
            .values()
            .find(|p| p.clock_after(seconds).is_none())
            .map(|p| p.id)
    }

    /// Move every provider clock forward by the same amount
    pub fn shift_provider_clocks(&mut self, seconds: u64) {
        if seconds == 0 {
            return;
        }
        for provider in self.providers.values_mut() {
            provider.shift_clock(seconds);
        }
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of providers
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

impl MemberDirectory for Directory {
    fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    fn members(&self) -> Box<dyn Iterator<Item = &Member> + '_> {
        Box::new(self.members.values())
    }
}

impl ProviderDirectory for Directory {
    fn provider(&self, id: ProviderId) -> Option<&Provider> {
        self.providers.get(&id)
    }

    fn providers(&self) -> Box<dyn Iterator<Item = &Provider> + '_> {
        Box::new(self.providers.values())
    }
}
