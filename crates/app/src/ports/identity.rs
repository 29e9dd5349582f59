//! Network identity port — the hardware address that namespaces every topic.

use mqthing_domain::error::ThingError;
use mqthing_domain::id::MacAddress;

/// Source of a stable per-host identity.
pub trait NetworkIdentity: Send + Sync {
    /// Hardware address of the network interface in use.
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be read or parsed.
    fn mac_address(&self) -> Result<MacAddress, ThingError>;
}

impl NetworkIdentity for MacAddress {
    fn mac_address(&self) -> Result<MacAddress, ThingError> {
        Ok(*self)
    }
}
