//! Cocoro cloud client interface.

use super::device::Device;
use crate::error::Result;
use async_trait::async_trait;

/// Operations the bridge needs from the Cocoro cloud.
///
/// Implementations own authentication state; `login` may be called before
/// every operation and should be cheap when a session is already valid.
#[async_trait]
pub trait CocoroApi: Send + Sync + 'static {
    /// Authenticate with the configured application secret and key.
    async fn login(&self) -> Result<()>;

    /// List every device registered to the account.
    async fn query_devices(&self) -> Result<Vec<Device>>;

    /// Fetch the latest server-side state of one device.
    async fn fetch_device(&self, device: &Device) -> Result<Device>;

    /// Submit the updates queued on `device` in a single request.
    async fn execute_queued_updates(&self, device: &Device) -> Result<()>;
}
