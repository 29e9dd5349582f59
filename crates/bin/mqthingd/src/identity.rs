//! Host identity read from the kernel's network interface table.

use std::path::{Path, PathBuf};

use mqthing_app::ports::NetworkIdentity;
use mqthing_domain::error::ThingError;
use mqthing_domain::id::MacAddress;

const SYSFS_NET: &str = "/sys/class/net";

/// [`NetworkIdentity`] backed by `/sys/class/net/<iface>/address`, with an
/// optional fixed override.
#[derive(Debug, Clone)]
pub struct InterfaceIdentity {
    interface: String,
    fixed: Option<MacAddress>,
    root: PathBuf,
}

impl InterfaceIdentity {
    /// Look up `interface`, or the first non-loopback interface when empty.
    #[must_use]
    pub fn new(interface: impl Into<String>, fixed: Option<MacAddress>) -> Self {
        Self {
            interface: interface.into(),
            fixed,
            root: PathBuf::from(SYSFS_NET),
        }
    }

    #[cfg(test)]
    fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn read_address(&self, interface: &str) -> Result<MacAddress, ThingError> {
        let path = self.root.join(interface).join("address");
        let raw = std::fs::read_to_string(&path).map_err(|err| ThingError::Transport(Box::new(err)))?;
        Ok(raw.trim().parse::<MacAddress>()?)
    }

    /// First interface, by name, that is not loopback and has a non-zero address.
    fn first_interface(&self) -> Result<MacAddress, ThingError> {
        let mut names: Vec<String> = std::fs::read_dir(&self.root)
            .map_err(|err| ThingError::Transport(Box::new(err)))?
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name != "lo")
            .collect();
        names.sort();

        names
            .iter()
            .filter_map(|name| self.read_address(name).ok())
            .find(|mac| mac.octets() != [0; 6])
            .ok_or_else(|| no_interface(&self.root))
    }
}

fn no_interface(root: &Path) -> ThingError {
    ThingError::Transport(format!("no usable network interface under {}", root.display()).into())
}

impl NetworkIdentity for InterfaceIdentity {
    fn mac_address(&self) -> Result<MacAddress, ThingError> {
        if let Some(mac) = self.fixed {
            return Ok(mac);
        }
        if self.interface.is_empty() {
            self.first_interface()
        } else {
            self.read_address(&self.interface)
        }
    }
}
