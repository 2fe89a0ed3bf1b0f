//! Access-control filter hooks
//!
//! The store never decides on its own who may see or change a ticket. Every
//! read path asks the injected [`FilterHooks`] for a read filter, every write
//! path for a write filter, and inserts are rewritten with the ingestion
//! documents before they are stored.

use serde_json::Value;
use triage_query::{Clause, FilterClause, Operand, Vars, DEFAULT_PREFIX};

use crate::context::RequestContext;
use crate::error::StoreError;

/// Access-control strategy injected into the store
///
/// Each hook is called once per operation; an error aborts the operation
/// and is returned to the caller unchanged.
pub trait FilterHooks: Send + Sync {
    /// Documents recursively merged into every inserted ticket
    ///
    /// # Errors
    /// Any error aborts the insert
    fn ingestion_filter(&self, ctx: &RequestContext) -> Result<Vec<Value>, StoreError>;

    /// Filter a ticket must pass to be read
    ///
    /// # Errors
    /// Any error aborts the read
    fn ticket_read_filter(&self, ctx: &RequestContext) -> Result<FilterClause, StoreError>;

    /// Filter a ticket must pass to be written
    ///
    /// # Errors
    /// Any error aborts the write
    fn ticket_write_filter(&self, ctx: &RequestContext) -> Result<FilterClause, StoreError>;
}

/// Hooks that allow everything and rewrite nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl FilterHooks for AllowAll {
    fn ingestion_filter(&self, _ctx: &RequestContext) -> Result<Vec<Value>, StoreError> {
        Ok(Vec::new())
    }

    fn ticket_read_filter(&self, _ctx: &RequestContext) -> Result<FilterClause, StoreError> {
        Ok(FilterClause::all())
    }

    fn ticket_write_filter(&self, _ctx: &RequestContext) -> Result<FilterClause, StoreError> {
        Ok(FilterClause::all())
    }
}

/// Hooks driven by the `read`/`write` access lists stored on each ticket
///
/// A ticket without an access list is open to everyone. Otherwise the
/// acting user must be listed in `users`, or share a group with `groups`.
#[derive(Debug, Clone, Default)]
pub struct AccessListHooks {
    ingestion: Vec<Value>,
    require_user: bool,
}

impl AccessListHooks {
    /// Hooks without ingestion rewrite
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `document` into every inserted ticket
    #[must_use]
    pub fn with_ingestion(mut self, document: Value) -> Self {
        self.ingestion.push(document);
        self
    }

    /// Reject anonymous requests with `AccessDenied`
    #[inline]
    #[must_use]
    pub fn require_user(mut self) -> Self {
        self.require_user = true;
        self
    }

    fn access_filter(&self, list: &str, ctx: &RequestContext) -> Result<FilterClause, StoreError> {
        if self.require_user && ctx.user().is_none() {
            return Err(StoreError::AccessDenied("anonymous request".into()));
        }

        let acl = |field: &str| Operand::field(DEFAULT_PREFIX, &format!("{list}.{field}"));
        let mut vars = Vars::new();
        let mut grants = vec![Clause::not(Clause::Truthy(Operand::field(DEFAULT_PREFIX, list)))];

        if let Some(user) = ctx.user() {
            let name = format!("{list}_user");
            vars.insert(name.clone(), Value::String(user.to_string()));
            grants.push(Clause::is_in(Operand::param(name), acl("users")));
        }
        for (i, group) in ctx.groups().iter().enumerate() {
            let name = format!("{list}_group{i}");
            vars.insert(name.clone(), Value::String(group.clone()));
            grants.push(Clause::is_in(Operand::param(name), acl("groups")));
        }

        let filter = FilterClause::new(Clause::or(grants), vars);
        tracing::debug!(list, %filter, "access filter");
        Ok(filter)
    }
}

impl FilterHooks for AccessListHooks {
    fn ingestion_filter(&self, ctx: &RequestContext) -> Result<Vec<Value>, StoreError> {
        if self.require_user && ctx.user().is_none() {
            return Err(StoreError::AccessDenied("anonymous request".into()));
        }
        Ok(self.ingestion.clone())
    }

    fn ticket_read_filter(&self, ctx: &RequestContext) -> Result<FilterClause, StoreError> {
        self.access_filter("read", ctx)
    }

    fn ticket_write_filter(&self, ctx: &RequestContext) -> Result<FilterClause, StoreError> {
        self.access_filter("write", ctx)
    }
}

/// Recursively merge `patch` into `target`
///
/// Objects are merged key by key; any other value in `patch` replaces the
/// value in `target`.
pub fn merge_document(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_document(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ticket(read: Value) -> Value {
        json!({ "id": 1, "name": "x", "read": read })
    }

    #[test]
    fn allow_all_is_a_no_op() {
        let ctx = RequestContext::anonymous();
        assert!(AllowAll.ticket_read_filter(&ctx).unwrap().is_all());
        assert!(AllowAll.ingestion_filter(&ctx).unwrap().is_empty());
    }

    #[test]
    fn missing_access_list_is_open() {
        let filter = AccessListHooks::new()
            .ticket_read_filter(&RequestContext::for_user("eve"))
            .unwrap();
        assert!(filter.matches(&json!({ "id": 1, "name": "x" })).unwrap());
    }

    #[test]
    fn listed_user_or_group_may_read() {
        let hooks = AccessListHooks::new();
        let doc = ticket(json!({ "users": ["bob"], "groups": ["soc"] }));

        let bob = hooks.ticket_read_filter(&RequestContext::for_user("bob")).unwrap();
        let analyst = hooks
            .ticket_read_filter(&RequestContext::for_user("amy").with_groups(["soc"]))
            .unwrap();
        let eve = hooks.ticket_read_filter(&RequestContext::for_user("eve")).unwrap();
        let anonymous = hooks.ticket_read_filter(&RequestContext::anonymous()).unwrap();

        assert!(bob.matches(&doc).unwrap());
        assert!(analyst.matches(&doc).unwrap());
        assert!(!eve.matches(&doc).unwrap());
        assert!(!anonymous.matches(&doc).unwrap());
    }

    #[test]
    fn write_filter_uses_write_list() {
        let hooks = AccessListHooks::new();
        let doc = json!({ "id": 1, "read": { "users": ["bob"] }, "write": { "users": ["amy"] } });
        let bob = hooks.ticket_write_filter(&RequestContext::for_user("bob")).unwrap();
        assert!(!bob.matches(&doc).unwrap());
    }

    #[test]
    fn anonymous_rejected_when_user_required() {
        let hooks = AccessListHooks::new().require_user();
        assert!(matches!(
            hooks.ticket_read_filter(&RequestContext::anonymous()),
            Err(StoreError::AccessDenied(_))
        ));
    }

    #[test]
    fn merge_is_recursive() {
        let mut doc = json!({ "name": "x", "details": { "a": 1, "b": { "c": 2 } } });
        merge_document(&mut doc, &json!({ "details": { "b": { "d": 3 } }, "owner": "soc" }));
        assert_eq!(
            doc,
            json!({ "name": "x", "details": { "a": 1, "b": { "c": 2, "d": 3 } }, "owner": "soc" })
        );
    }
}
