//! Unit of work driven by the scheduler

use async_trait::async_trait;

use crate::cycle::RenewalAttempt;

/// One complete renewal, from opening the control session to reporting the
/// resulting exit IP
///
/// Implementations catch every failure themselves; the outcome is carried
/// in the returned [`RenewalAttempt`].
#[async_trait]
pub trait Renewal: Send + Sync {
    /// Run one renewal cycle to completion
    async fn renew(&self) -> RenewalAttempt;
}
