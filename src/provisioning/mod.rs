//! Account provisioning: the sign-up saga and the profile records it seeds.

mod profile;
mod saga;

pub use profile::{Profile, ProfileChanges, ProfileService, ProfileSnapshot};
pub use saga::{ProvisioningSaga, ProvisioningStatus, SignUpForm};
