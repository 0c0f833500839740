use crate::{JitProvisioningConfig, JitProvisioningConfigBuilder};
use std::collections::BTreeSet;

/// A named configuration value attached to an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityProviderProperty {
    pub name: String,
    pub value: String,
}

impl IdentityProviderProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An identity provider, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProvider {
    id: i64,
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    enabled: bool,
    jit_provisioning: JitProvisioningConfig,
    properties: BTreeSet<IdentityProviderProperty>,
}

impl IdentityProvider {
    pub fn builder(id: i64, name: impl Into<String>) -> IdentityProviderBuilder {
        IdentityProviderBuilder::new(id, name)
    }
    pub fn id(&self) -> i64 {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn jit_provisioning(&self) -> &JitProvisioningConfig {
        &self.jit_provisioning
    }
    pub fn properties(&self) -> &BTreeSet<IdentityProviderProperty> {
        &self.properties
    }
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
    /// Builder initialized with this provider, to derive a modified copy.
    pub fn to_builder(&self) -> IdentityProviderBuilder {
        IdentityProviderBuilder {
            id: self.id,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            enabled: self.enabled,
            jit_provisioning: JitProvisioningConfig::builder()
                .jit_enabled(self.jit_provisioning.is_jit_enabled())
                .add_provisioning_idps(self.jit_provisioning.provisioning_idps().iter().cloned()),
            properties: self.properties.clone(),
        }
    }
}

/// Assembles an [`IdentityProvider`], delegating the provisioning settings to
/// a nested [`JitProvisioningConfigBuilder`].
#[derive(Debug, Clone)]
pub struct IdentityProviderBuilder {
    id: i64,
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    enabled: bool,
    jit_provisioning: JitProvisioningConfigBuilder,
    properties: BTreeSet<IdentityProviderProperty>,
}

impl IdentityProviderBuilder {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            display_name: None,
            description: None,
            enabled: true,
            jit_provisioning: JitProvisioningConfig::builder(),
            properties: BTreeSet::new(),
        }
    }
    pub fn id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
    pub fn jit_enabled(mut self, jit_enabled: bool) -> Self {
        self.jit_provisioning = self.jit_provisioning.jit_enabled(jit_enabled);
        self
    }
    pub fn set_provisioning_idps<I, S>(mut self, idps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jit_provisioning = self.jit_provisioning.set_provisioning_idps(idps);
        self
    }
    pub fn add_provisioning_idp(mut self, idp: impl Into<String>) -> Self {
        self.jit_provisioning = self.jit_provisioning.add_provisioning_idp(idp);
        self
    }
    pub fn add_provisioning_idps<I, S>(mut self, idps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jit_provisioning = self.jit_provisioning.add_provisioning_idps(idps);
        self
    }
    /// Replace the properties, an empty input keeps the current ones.
    pub fn set_properties(
        mut self,
        properties: impl IntoIterator<Item = IdentityProviderProperty>,
    ) -> Self {
        let properties: BTreeSet<_> = properties.into_iter().collect();
        if !properties.is_empty() {
            self.properties = properties;
        }
        self
    }
    pub fn add_property(mut self, property: IdentityProviderProperty) -> Self {
        self.properties.insert(property);
        self
    }
    pub fn add_properties(
        mut self,
        properties: impl IntoIterator<Item = IdentityProviderProperty>,
    ) -> Self {
        self.properties.extend(properties);
        self
    }
    pub fn build(self) -> IdentityProvider {
        IdentityProvider {
            id: self.id,
            name: self.name,
            display_name: self.display_name,
            description: self.description,
            enabled: self.enabled,
            jit_provisioning: self.jit_provisioning.build(),
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_builders() {
        let idp = IdentityProvider::builder(3, "google")
            .display_name("Google")
            .jit_enabled(true)
            .add_provisioning_idp("facebook")
            .add_property(IdentityProviderProperty::new("client_id", "abc"))
            .set_properties([])
            .build();
        assert_eq!(idp.id(), 3);
        assert_eq!(idp.name(), "google");
        assert_eq!(idp.display_name(), Some("Google"));
        assert_eq!(idp.description(), None);
        assert!(idp.is_enabled());
        assert!(idp.jit_provisioning().is_jit_enabled());
        assert!(idp.jit_provisioning().provisioning_idps().contains("facebook"));
        assert_eq!(idp.property("client_id"), Some("abc"));
    }

    #[test]
    fn to_builder_round_trip() {
        let idp = IdentityProvider::builder(1, "github")
            .enabled(false)
            .add_provisioning_idp("google")
            .add_property(IdentityProviderProperty::new("scope", "openid"))
            .build();
        assert_eq!(idp.to_builder().build(), idp);
        let renamed = idp.to_builder().id(2).build();
        assert_eq!(renamed.id(), 2);
        assert_eq!(renamed.properties(), idp.properties());
    }
}
