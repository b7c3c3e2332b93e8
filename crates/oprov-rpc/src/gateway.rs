//! ---
//! oprov_section: "05-networking-external-interfaces"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "RPC gateway towards the Odoo object API."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
//! Authentication and the session handle used for every model call.

use std::fmt;
use std::sync::Arc;

use oprov_common::Credentials;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::RpcError;
use crate::transport::{RpcTransport, Service};
use crate::value::RecordId;

/// Failure to open an authenticated session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The server could not be reached or answered unexpectedly.
    #[error("unable to reach platform at {url} during {stage}: {source}")]
    Rpc {
        /// Base URL of the server.
        url: String,
        /// `version` or `authenticate`.
        stage: &'static str,
        /// Underlying transport failure.
        #[source]
        source: RpcError,
    },
    /// The server rejected the credentials.
    #[error(
        "authentication failed for login '{login}' on database '{db}'; check odoo.db, odoo.admin_login and odoo.admin_password"
    )]
    AuthenticationFailed {
        /// Database name.
        db: String,
        /// Login that was rejected.
        login: String,
    },
}

/// Authenticated session bound to one database and user.
#[derive(Clone)]
pub struct Connection {
    transport: Arc<dyn RpcTransport>,
    db: String,
    login: String,
    uid: RecordId,
    secret: String,
    server_version: Option<String>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("db", &self.db)
            .field("login", &self.login)
            .field("uid", &self.uid)
            .field("secret", &"<redacted>")
            .field("server_version", &self.server_version)
            .finish()
    }
}

impl Connection {
    /// Database the session is bound to.
    pub fn db(&self) -> &str {
        &self.db
    }

    /// Authenticated user id.
    pub fn uid(&self) -> RecordId {
        self.uid
    }

    /// Server version reported by the `version` call.
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Perform one `execute_kw` round trip on the object service.
    pub async fn execute_kw(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, RpcError> {
        debug!(model, method, "execute_kw");
        self.transport
            .call(
                Service::Object,
                "execute_kw",
                vec![
                    Value::from(self.db.as_str()),
                    Value::from(self.uid),
                    Value::from(self.secret.as_str()),
                    Value::from(model),
                    Value::from(method),
                    Value::Array(args),
                    Value::Object(kwargs),
                ],
            )
            .await
    }
}

/// Probe the server version, then authenticate.
///
/// A `false` (or non-positive) uid from `authenticate` means the credentials
/// were rejected.
pub async fn connect(
    transport: Arc<dyn RpcTransport>,
    credentials: &Credentials,
) -> Result<Connection, ConnectError> {
    let url = credentials.base_url.to_string();
    info!(url = %url, db = %credentials.db, "connecting to platform");

    let version = transport
        .call(Service::Common, "version", Vec::new())
        .await
        .map_err(|source| ConnectError::Rpc {
            url: url.clone(),
            stage: "version",
            source,
        })?;
    let server_version = version
        .get("server_version")
        .and_then(Value::as_str)
        .map(str::to_owned);
    info!(
        server_version = server_version.as_deref().unwrap_or("unknown"),
        "platform reachable"
    );

    let uid = transport
        .call(
            Service::Common,
            "authenticate",
            vec![
                Value::from(credentials.db.as_str()),
                Value::from(credentials.login.as_str()),
                Value::from(credentials.secret.as_str()),
                json!({}),
            ],
        )
        .await
        .map_err(|source| ConnectError::Rpc {
            url: url.clone(),
            stage: "authenticate",
            source,
        })?;

    let uid = match uid.as_i64() {
        Some(uid) if uid > 0 => uid,
        _ => {
            return Err(ConnectError::AuthenticationFailed {
                db: credentials.db.clone(),
                login: credentials.login.clone(),
            })
        }
    };
    info!(uid, login = %credentials.login, "authenticated");

    Ok(Connection {
        transport,
        db: credentials.db.clone(),
        login: credentials.login.clone(),
        uid,
        secret: credentials.secret.clone(),
        server_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Debug)]
    struct Scripted {
        uid: Value,
        calls: Mutex<Vec<(Service, String, Vec<Value>)>>,
    }

    impl Scripted {
        fn new(uid: Value) -> Arc<Self> {
            Arc::new(Self {
                uid,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RpcTransport for Scripted {
        async fn call(
            &self,
            service: Service,
            method: &str,
            args: Vec<Value>,
        ) -> Result<Value, RpcError> {
            self.calls
                .lock()
                .unwrap()
                .push((service, method.to_owned(), args.clone()));
            match (service, method) {
                (Service::Common, "version") => Ok(json!({"server_version": "17.0"})),
                (Service::Common, "authenticate") => Ok(self.uid.clone()),
                (Service::Object, "execute_kw") => Ok(json!([1])),
                _ => Err(RpcError::Unexpected(format!("unscripted {method}"))),
            }
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            base_url: Url::parse("http://localhost:8069").unwrap(),
            db: "prod".into(),
            login: "admin".into(),
            secret: "s3cret".into(),
        }
    }

    #[tokio::test]
    async fn connect_reads_version_then_authenticates() {
        let transport = Scripted::new(json!(2));
        let connection = connect(transport.clone(), &credentials()).await.unwrap();
        assert_eq!(connection.uid(), 2);
        assert_eq!(connection.server_version(), Some("17.0"));

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].1, "version");
        assert_eq!(calls[1].1, "authenticate");
        assert_eq!(calls[1].2[0], json!("prod"));
        assert_eq!(calls[1].2[1], json!("admin"));
    }

    #[tokio::test]
    async fn false_uid_is_authentication_failure() {
        let transport = Scripted::new(json!(false));
        let err = connect(transport, &credentials()).await.unwrap_err();
        assert!(matches!(err, ConnectError::AuthenticationFailed { .. }));
        assert!(err.to_string().contains("odoo.admin_password"));
    }

    #[tokio::test]
    async fn execute_kw_sends_session_and_call_arguments() {
        let transport = Scripted::new(json!(2));
        let connection = connect(transport.clone(), &credentials()).await.unwrap();
        let mut kwargs = Map::new();
        kwargs.insert("limit".into(), json!(1));
        connection
            .execute_kw("res.users", "search", vec![json!([])], kwargs)
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        let (service, method, args) = calls.last().unwrap();
        assert_eq!(*service, Service::Object);
        assert_eq!(method, "execute_kw");
        assert_eq!(
            args,
            &vec![
                json!("prod"),
                json!(2),
                json!("s3cret"),
                json!("res.users"),
                json!("search"),
                json!([[]]),
                json!({"limit": 1})
            ]
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let connection = Connection {
            transport: Scripted::new(json!(2)),
            db: "prod".into(),
            login: "admin".into(),
            uid: 2,
            secret: "s3cret".into(),
            server_version: None,
        };
        assert!(!format!("{connection:?}").contains("s3cret"));
    }
}
