//! Device identity
//!
//! Every device announces itself as `<base>-<chip id>`, where the chip id is
//! derived from the factory MAC address. The name doubles as the DHCP
//! hostname and the title of the exposed thing.

use core::fmt::{self, Write};

use heapless::String;
use thiserror_no_std::Error;

use crate::config::NameCasing;

/// Maximum device name length. Hostnames longer than this are rejected by
/// most DHCP servers anyway.
pub const MAX_NAME_LEN: usize = 32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    #[error("device name exceeds {limit} characters")]
    NameTooLong { limit: usize },
}

/// Chip id from a factory MAC address: the low three bytes, big-endian.
pub const fn chip_id_from_mac(mac: [u8; 6]) -> u32 {
    ((mac[3] as u32) << 16) | ((mac[4] as u32) << 8) | mac[5] as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceName(String<MAX_NAME_LEN>);

impl DeviceName {
    pub fn derive(base: &str, chip_id: u32, casing: NameCasing) -> Result<Self, IdentityError> {
        let mut name = String::<MAX_NAME_LEN>::new();
        write!(name, "{}-{}", base, chip_id)
            .map_err(|_| IdentityError::NameTooLong {
                limit: MAX_NAME_LEN,
            })?;

        if casing == NameCasing::Lowercase {
            name.as_mut_str().make_ascii_lowercase();
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
