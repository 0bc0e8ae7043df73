//! Access rights and account scoping
//!
//! A granted access key may restrict a request to a set of accounts. The
//! restriction becomes an extra condition ANDed to every query of the
//! `accounts`, `transactions` and `messages` collections, and the same
//! condition is evaluated in memory against pushed documents.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{QueryError, QueryResult};
use crate::filter::{BoundParams, CompareOp, QlExpr};

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRights {
    pub granted: bool,
    /// Empty means unrestricted
    #[serde(default)]
    pub restrict_to_accounts: Vec<String>,
}

impl AccessRights {
    pub fn granted() -> Self {
        Self {
            granted: true,
            restrict_to_accounts: Vec::new(),
        }
    }

    pub fn denied() -> Self {
        Self {
            granted: false,
            restrict_to_accounts: Vec::new(),
        }
    }

    pub fn restricted_to<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: true,
            restrict_to_accounts: accounts.into_iter().map(Into::into).collect(),
        }
    }
}

/// Access key checker
#[async_trait]
pub trait AccessControl: Send + Sync {
    async fn require_granted_access(&self, access_key: Option<&str>) -> QueryResult<AccessRights>;
}

/// Grants every key, unrestricted
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantAll;

#[async_trait]
impl AccessControl for GrantAll {
    async fn require_granted_access(&self, _access_key: Option<&str>) -> QueryResult<AccessRights> {
        Ok(AccessRights::granted())
    }
}

/// Per-request state shared by all operations of one request
///
/// Every operation of a request must use the same access key.
#[derive(Debug, Default)]
pub struct RequestContext {
    access_key: Option<String>,
    used_access_key: Mutex<Option<String>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key supplied by the transport (header); takes precedence over
    /// per-operation keys
    pub fn with_access_key(access_key: impl Into<String>) -> Self {
        Self {
            access_key: Some(access_key.into()),
            used_access_key: Mutex::new(None),
        }
    }

    /// Resolves the effective key, enforces key uniqueness and checks it.
    pub async fn require_granted_access(
        &self,
        access: &dyn AccessControl,
        args_access_key: Option<&str>,
    ) -> QueryResult<AccessRights> {
        let access_key = self.access_key.as_deref().or(args_access_key);
        self.check_used_access_key(access_key)?;
        let rights = access.require_granted_access(access_key).await?;
        if !rights.granted {
            return Err(QueryError::Unauthorized);
        }
        Ok(rights)
    }

    fn check_used_access_key(&self, access_key: Option<&str>) -> QueryResult<()> {
        let Some(key) = access_key else {
            return Ok(());
        };
        let mut used = self
            .used_access_key
            .lock()
            .map_err(|_| QueryError::Internal("request context lock poisoned".into()))?;
        match used.as_deref() {
            Some(existing) if existing != key => Err(QueryError::MultipleAccessKeys),
            _ => {
                *used = Some(key.to_string());
                Ok(())
            }
        }
    }
}

/// Account scope of `collection`, binding the account ids into `params`.
///
/// Returns `None` when the rights are unrestricted or the collection is not
/// account-scoped.
pub fn access_scope(collection: &str, rights: &AccessRights, params: &mut BoundParams) -> Option<QlExpr> {
    let accounts = &rights.restrict_to_accounts;
    if accounts.is_empty() {
        return None;
    }
    let fields: &[&str] = match collection {
        "accounts" => &["doc._key"],
        "transactions" => &["doc.account_addr"],
        "messages" => &["doc.src", "doc.dst"],
        _ => return None,
    };
    let scoped = |path: &str, names: &[String]| -> QlExpr {
        if names.len() == 1 {
            QlExpr::Compare {
                path: path.to_string(),
                op: CompareOp::Eq,
                param: names[0].clone(),
            }
        } else {
            QlExpr::InParams {
                path: path.to_string(),
                params: names.to_vec(),
            }
        }
    };
    let names: Vec<String> = accounts
        .iter()
        .map(|account| params.add(Value::String(account.clone())))
        .collect();
    let mut conditions: Vec<QlExpr> = fields.iter().map(|path| scoped(path, &names)).collect();
    if conditions.len() == 1 {
        conditions.pop()
    } else {
        Some(QlExpr::Or(conditions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct DenyAll;

    #[async_trait]
    impl AccessControl for DenyAll {
        async fn require_granted_access(&self, _key: Option<&str>) -> QueryResult<AccessRights> {
            Ok(AccessRights::denied())
        }
    }

    #[test]
    fn test_scope_text_per_collection() {
        let rights = AccessRights::restricted_to(["0:aa"]);

        let mut params = BoundParams::new();
        let scope = access_scope("accounts", &rights, &mut params).unwrap();
        assert_eq!(scope.to_string(), "doc._key == @v1");

        let mut params = BoundParams::new();
        let scope = access_scope("messages", &rights, &mut params).unwrap();
        assert_eq!(scope.to_string(), "(doc.src == @v1) OR (doc.dst == @v1)");
        assert_eq!(params.count(), 1);

        let rights = AccessRights::restricted_to(["0:aa", "0:bb"]);
        let mut params = BoundParams::new();
        let scope = access_scope("transactions", &rights, &mut params).unwrap();
        assert_eq!(scope.to_string(), "doc.account_addr IN [@v1,@v2]");

        assert!(access_scope("blocks", &rights, &mut BoundParams::new()).is_none());
        assert!(access_scope("accounts", &AccessRights::granted(), &mut BoundParams::new()).is_none());
    }

    #[test]
    fn test_scope_evaluates_in_memory() {
        let rights = AccessRights::restricted_to(["0:aa", "0:bb"]);
        let mut params = BoundParams::new();
        let scope = access_scope("messages", &rights, &mut params).unwrap();

        assert!(scope.evaluate(&json!({"src": "0:cc", "dst": "0:bb"}), &params).unwrap());
        assert!(!scope.evaluate(&json!({"src": "0:cc", "dst": "0:dd"}), &params).unwrap());
    }

    #[tokio::test]
    async fn test_request_uses_one_access_key() {
        let ctx = RequestContext::new();
        ctx.require_granted_access(&GrantAll, Some("k1")).await.unwrap();
        ctx.require_granted_access(&GrantAll, None).await.unwrap();
        ctx.require_granted_access(&GrantAll, Some("k1")).await.unwrap();
        let err = ctx.require_granted_access(&GrantAll, Some("k2")).await.unwrap_err();
        assert_eq!(err, QueryError::MultipleAccessKeys);

        let header = RequestContext::with_access_key("h");
        header.require_granted_access(&GrantAll, Some("other")).await.unwrap();
    }

    #[tokio::test]
    async fn test_denied_access_is_unauthorized() {
        let ctx = RequestContext::new();
        let err = ctx.require_granted_access(&DenyAll, Some("k")).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
