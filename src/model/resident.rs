use crate::{IdentityProvider, IdentityProviderBuilder};
use std::ops::Deref;

/// The identity provider representing this server itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidentIdentityProvider(IdentityProvider);

impl ResidentIdentityProvider {
    /// Name the resident identity provider is stored under.
    pub const NAME: &'static str = "LOCAL";

    pub fn builder(id: i64, name: impl Into<String>) -> ResidentIdentityProviderBuilder {
        ResidentIdentityProviderBuilder(IdentityProviderBuilder::new(id, name))
    }

    pub fn into_inner(self) -> IdentityProvider {
        self.0
    }
}

impl Deref for ResidentIdentityProvider {
    type Target = IdentityProvider;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<IdentityProvider> for ResidentIdentityProvider {
    fn from(value: IdentityProvider) -> Self {
        Self(value)
    }
}

/// Builds a [`ResidentIdentityProvider`], every setter of
/// [`IdentityProviderBuilder`] is reachable through `map`.
#[derive(Debug, Clone)]
pub struct ResidentIdentityProviderBuilder(IdentityProviderBuilder);

impl ResidentIdentityProviderBuilder {
    pub fn map(self, f: impl FnOnce(IdentityProviderBuilder) -> IdentityProviderBuilder) -> Self {
        Self(f(self.0))
    }
    pub fn build(self) -> ResidentIdentityProvider {
        ResidentIdentityProvider(self.0.build())
    }
}
