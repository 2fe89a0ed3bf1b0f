//! Per-request context
//!
//! Carries the acting user and groups for the filter hooks, and the
//! cancellation token and deadline every operation checks between steps.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// Identity and lifetime of one store request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<String>,
    groups: Vec<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without a user
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context acting as `user`
    #[must_use]
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    /// With group memberships
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// With an external cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// With an absolute deadline
    #[inline]
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// With a deadline relative to now
    #[inline]
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Acting user
    #[inline]
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Group memberships of the acting user
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Name recorded in activity logs
    #[inline]
    #[must_use]
    pub fn actor(&self) -> &str {
        self.user.as_deref().unwrap_or("system")
    }

    /// Cancellation token of this request
    #[inline]
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the request
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail when the request was cancelled or its deadline passed
    ///
    /// # Errors
    /// `StoreError::Canceled` or `StoreError::DeadlineExceeded`
    pub fn check(&self) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Canceled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_live() {
        let ctx = RequestContext::for_user("bob").with_groups(["soc"]);
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.user(), Some("bob"));
        assert_eq!(ctx.groups(), ["soc".to_string()]);
        assert_eq!(RequestContext::anonymous().actor(), "system");
    }

    #[test]
    fn cancellation_is_shared_with_clones() {
        let ctx = RequestContext::for_user("bob");
        let clone = ctx.clone();
        ctx.cancel();
        assert_eq!(clone.check(), Err(StoreError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let ctx = RequestContext::anonymous().with_timeout(Duration::from_secs(5));
        assert!(ctx.check().is_ok());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(ctx.check(), Err(StoreError::DeadlineExceeded));
    }
}
