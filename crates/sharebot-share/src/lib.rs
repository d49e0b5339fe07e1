//! ShareBot share adapters
//!
//! Implementations of the core `IShareConnector` port:
//!
//! - [`MountedShareConnector`] - the share is mounted locally (CIFS via
//!   fstab, autofs, ...) and accessed with `tokio::fs`
//! - `SmbShareConnector` - direct SMB through libsmbclient; only built with
//!   the `smb` cargo feature
//!
//! [`connector_for`] picks one from the configuration.

use std::sync::Arc;

use anyhow::Context;
use sharebot_core::config::{ShareBackend, ShareConfig};
use sharebot_core::ports::IShareConnector;

pub mod mounted;
#[cfg(feature = "smb")]
pub mod smb;

pub use mounted::MountedShareConnector;
#[cfg(feature = "smb")]
pub use smb::SmbShareConnector;

/// Builds the connector selected by `share.backend`
///
/// # Errors
/// Fails when the backend is not compiled in or its settings are incomplete
pub fn connector_for(config: &ShareConfig) -> anyhow::Result<Arc<dyn IShareConnector>> {
    match config.backend {
        ShareBackend::Mount => {
            let mount_point = config
                .mount_point
                .clone()
                .context("share.mount_point is required for the mount backend")?;
            Ok(Arc::new(MountedShareConnector::new(mount_point)))
        }
        ShareBackend::Smb => smb_connector(config),
    }
}

#[cfg(feature = "smb")]
fn smb_connector(config: &ShareConfig) -> anyhow::Result<Arc<dyn IShareConnector>> {
    Ok(Arc::new(SmbShareConnector::from_config(config)))
}

#[cfg(not(feature = "smb"))]
fn smb_connector(_config: &ShareConfig) -> anyhow::Result<Arc<dyn IShareConnector>> {
    anyhow::bail!(
        "SMB support is not compiled in. Rebuild with --features smb, \
         or mount the share and set SHARE_BACKEND=mount"
    )
}
