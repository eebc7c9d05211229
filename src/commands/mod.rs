//! CLI command implementations.

use std::sync::Arc;

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::transport::ReqwestTransport;

pub mod check;
pub mod init;
pub mod normalize;
pub mod run;
pub mod serve;

/// Transport for webhook alerts, sharing the configured retry policy
pub(crate) fn alert_transport(settings: &SyncSettings) -> Result<Arc<ReqwestTransport>, SyncError> {
    Ok(Arc::new(ReqwestTransport::new(settings.retry)?))
}
