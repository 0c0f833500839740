mod identity_provider;
mod jit_provisioning;
mod resident;

pub use identity_provider::*;
pub use jit_provisioning::*;
pub use resident::*;
