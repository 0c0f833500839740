use std::collections::BTreeSet;

/// Configuration of just-in-time provisioning.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct JitProvisioningConfig {
    jit_enabled: bool,
    /// Identity providers provisioning users into this one.
    provisioning_idps: BTreeSet<String>,
}

impl JitProvisioningConfig {
    pub fn builder() -> JitProvisioningConfigBuilder {
        JitProvisioningConfigBuilder::default()
    }
    pub fn is_jit_enabled(&self) -> bool {
        self.jit_enabled
    }
    pub fn provisioning_idps(&self) -> &BTreeSet<String> {
        &self.provisioning_idps
    }
}

#[derive(Default, Debug, Clone)]
pub struct JitProvisioningConfigBuilder {
    jit_enabled: bool,
    provisioning_idps: BTreeSet<String>,
}

impl JitProvisioningConfigBuilder {
    pub fn jit_enabled(mut self, jit_enabled: bool) -> Self {
        self.jit_enabled = jit_enabled;
        self
    }
    /// Replace the provisioning identity providers, an empty input keeps the current ones.
    pub fn set_provisioning_idps<I, S>(mut self, idps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idps = non_blank(idps);
        if !idps.is_empty() {
            self.provisioning_idps = idps;
        }
        self
    }
    pub fn add_provisioning_idp(self, idp: impl Into<String>) -> Self {
        self.add_provisioning_idps([idp])
    }
    pub fn add_provisioning_idps<I, S>(mut self, idps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provisioning_idps.extend(non_blank(idps));
        self
    }
    pub fn build(self) -> JitProvisioningConfig {
        JitProvisioningConfig {
            jit_enabled: self.jit_enabled,
            provisioning_idps: self.provisioning_idps,
        }
    }
}

fn non_blank<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .filter(|v| !v.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_idps_are_ignored() {
        let config = JitProvisioningConfig::builder()
            .jit_enabled(true)
            .add_provisioning_idp("google")
            .add_provisioning_idp("  ")
            .add_provisioning_idps(["facebook", ""])
            .build();
        assert!(config.is_jit_enabled());
        assert_eq!(
            config.provisioning_idps().iter().collect::<Vec<_>>(),
            ["facebook", "google"]
        );
    }

    #[test]
    fn set_replaces_only_when_not_empty() {
        let builder = JitProvisioningConfig::builder().add_provisioning_idp("google");
        let kept = builder
            .clone()
            .set_provisioning_idps(Vec::<String>::new())
            .build();
        assert_eq!(kept.provisioning_idps().len(), 1);
        let replaced = builder.set_provisioning_idps(["github"]).build();
        assert!(replaced.provisioning_idps().contains("github"));
        assert!(!replaced.provisioning_idps().contains("google"));
    }
}
