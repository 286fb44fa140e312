//! Broker administration over RPC.
//!
//! Thin forwarding to the broker's management modules. Names, passwords and
//! permission patterns travel as binaries, matching what the broker stores.

use crate::connection::ConnectionProvider;
use crate::error::{AdminError, RpcError};
use crate::executor::RpcExecutor;
use otprpc_protocol::Term;

const ACCESS_CONTROL: &str = "rabbit_access_control";
const RABBIT: &str = "rabbit";
const MNESIA: &str = "rabbit_mnesia";

/// Virtual host used when none is given.
pub const DEFAULT_VHOST: &str = "/";

/// One permission entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    /// The user in per-vhost listings, the vhost in per-user listings.
    pub name: String,
    pub configure: String,
    pub write: String,
    pub read: String,
}

/// An application running on the broker node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Parsed `rabbit:status()` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerStatus {
    pub running_applications: Vec<Application>,
    pub nodes: Vec<String>,
    pub running_nodes: Vec<String>,
}

impl BrokerStatus {
    /// Returns true if the `rabbit` application is running.
    pub fn is_running(&self) -> bool {
        self.running_applications.iter().any(|a| a.name == "rabbit")
    }
}

/// Administration client for a broker node.
pub struct BrokerAdmin<P> {
    executor: RpcExecutor<P>,
}

impl<P: ConnectionProvider> BrokerAdmin<P> {
    pub fn new(executor: RpcExecutor<P>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RpcExecutor<P> {
        &self.executor
    }

    fn call(&self, module: &str, function: &str, args: Vec<Term>) -> Result<Term, AdminError> {
        Ok(self.executor.execute(module, function, &args)?)
    }

    /// Calls a function expected to answer `ok`.
    fn call_ok(
        &self,
        module: &'static str,
        function: &'static str,
        args: Vec<Term>,
    ) -> Result<(), AdminError> {
        let reply = self.call(module, function, args)?;
        if reply.is_atom("ok") {
            Ok(())
        } else {
            Err(AdminError::UnexpectedReply {
                module,
                function,
                reply,
            })
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn add_user(&self, username: &str, password: &str) -> Result<(), AdminError> {
        self.call_ok(
            ACCESS_CONTROL,
            "add_user",
            vec![Term::binary(username), Term::binary(password)],
        )
    }

    pub fn delete_user(&self, username: &str) -> Result<(), AdminError> {
        self.call_ok(ACCESS_CONTROL, "delete_user", vec![Term::binary(username)])
    }

    pub fn change_user_password(&self, username: &str, new_password: &str) -> Result<(), AdminError> {
        self.call_ok(
            ACCESS_CONTROL,
            "change_password",
            vec![Term::binary(username), Term::binary(new_password)],
        )
    }

    pub fn list_users(&self) -> Result<Vec<String>, AdminError> {
        let reply = self.call(ACCESS_CONTROL, "list_users", vec![])?;
        text_list(ACCESS_CONTROL, "list_users", reply)
    }

    // =========================================================================
    // Virtual hosts
    // =========================================================================

    pub fn add_vhost(&self, vhost: &str) -> Result<(), AdminError> {
        self.call_ok(ACCESS_CONTROL, "add_vhost", vec![Term::binary(vhost)])
    }

    pub fn delete_vhost(&self, vhost: &str) -> Result<(), AdminError> {
        self.call_ok(ACCESS_CONTROL, "delete_vhost", vec![Term::binary(vhost)])
    }

    pub fn list_vhosts(&self) -> Result<Vec<String>, AdminError> {
        let reply = self.call(ACCESS_CONTROL, "list_vhosts", vec![])?;
        text_list(ACCESS_CONTROL, "list_vhosts", reply)
    }

    // =========================================================================
    // Permissions
    // =========================================================================

    /// Grants `username` the given regex patterns on `vhost` (default `/`).
    pub fn set_permissions(
        &self,
        username: &str,
        configure: &str,
        read: &str,
        write: &str,
        vhost: Option<&str>,
    ) -> Result<(), AdminError> {
        // The broker takes write before read.
        self.call_ok(
            ACCESS_CONTROL,
            "set_permissions",
            vec![
                Term::binary(username),
                Term::binary(vhost.unwrap_or(DEFAULT_VHOST)),
                Term::binary(configure),
                Term::binary(write),
                Term::binary(read),
            ],
        )
    }

    pub fn clear_permissions(&self, username: &str, vhost: Option<&str>) -> Result<(), AdminError> {
        self.call_ok(
            ACCESS_CONTROL,
            "clear_permissions",
            vec![
                Term::binary(username),
                Term::binary(vhost.unwrap_or(DEFAULT_VHOST)),
            ],
        )
    }

    /// Lists per-user permissions on `vhost` (default `/`).
    pub fn list_permissions(&self, vhost: Option<&str>) -> Result<Vec<Permission>, AdminError> {
        let function = "list_vhost_permissions";
        let reply = self.call(
            ACCESS_CONTROL,
            function,
            vec![Term::binary(vhost.unwrap_or(DEFAULT_VHOST))],
        )?;
        permission_list(function, reply)
    }

    /// Lists per-vhost permissions of `username`.
    pub fn list_user_permissions(&self, username: &str) -> Result<Vec<Permission>, AdminError> {
        let function = "list_user_permissions";
        let reply = self.call(ACCESS_CONTROL, function, vec![Term::binary(username)])?;
        permission_list(function, reply)
    }

    // =========================================================================
    // Node lifecycle
    // =========================================================================

    pub fn start_broker_application(&self) -> Result<(), AdminError> {
        self.call_ok(RABBIT, "start", vec![])
    }

    pub fn stop_broker_application(&self) -> Result<(), AdminError> {
        self.call_ok(RABBIT, "stop", vec![])
    }

    /// Stops the broker and halts its node.
    ///
    /// Any reply is accepted. The node usually goes down before answering,
    /// which shows up as `{badrpc, nodedown}` or a dropped connection; both
    /// count as success. Failing to connect in the first place does not.
    pub fn stop_node(&self) -> Result<(), AdminError> {
        match self.executor.execute(RABBIT, "stop_and_halt", &[]) {
            Ok(_) => Ok(()),
            Err(e @ (RpcError::BadRpc(_) | RpcError::Access(_))) => {
                tracing::debug!("Node went down during stop_and_halt: {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn reset_node(&self) -> Result<(), AdminError> {
        self.call_ok(MNESIA, "reset", vec![])
    }

    pub fn force_reset_node(&self) -> Result<(), AdminError> {
        self.call_ok(MNESIA, "force_reset", vec![])
    }

    pub fn status(&self) -> Result<BrokerStatus, AdminError> {
        let reply = self.call(RABBIT, "status", vec![])?;
        parse_status(reply)
    }
}

/// Text of a binary, string, atom or charlist.
fn text_of(term: &Term) -> Option<String> {
    if let Some(text) = term.as_str_lossy() {
        return Some(text.into_owned());
    }
    term.as_list()?
        .iter()
        .map(|c| c.as_integer().and_then(|n| u32::try_from(n).ok()).and_then(char::from_u32))
        .collect()
}

fn text_list(
    module: &'static str,
    function: &'static str,
    reply: Term,
) -> Result<Vec<String>, AdminError> {
    let parsed = reply
        .as_list()
        .and_then(|items| items.iter().map(text_of).collect::<Option<Vec<_>>>());
    parsed.ok_or(AdminError::UnexpectedReply {
        module,
        function,
        reply,
    })
}

fn permission_list(function: &'static str, reply: Term) -> Result<Vec<Permission>, AdminError> {
    let parsed = reply.as_list().and_then(|items| {
        items
            .iter()
            .map(|item| match item.as_tuple()? {
                [name, configure, write, read] => Some(Permission {
                    name: text_of(name)?,
                    configure: text_of(configure)?,
                    write: text_of(write)?,
                    read: text_of(read)?,
                }),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
    });
    parsed.ok_or(AdminError::UnexpectedReply {
        module: ACCESS_CONTROL,
        function,
        reply,
    })
}

/// Node names from either `[node(), ...]` or `[{Type, [node(), ...]}, ...]`.
fn node_names(term: &Term) -> Vec<String> {
    let mut names = Vec::new();
    for item in term.as_list().unwrap_or_default() {
        match item.as_tuple() {
            Some([_, members]) => names.extend(node_names(members)),
            _ => names.extend(text_of(item)),
        }
    }
    names
}

fn parse_status(reply: Term) -> Result<BrokerStatus, AdminError> {
    let Some(entries) = reply.as_list() else {
        return Err(AdminError::UnexpectedReply {
            module: RABBIT,
            function: "status",
            reply,
        });
    };

    let mut status = BrokerStatus::default();
    for entry in entries {
        let Some([key, value]) = entry.as_tuple() else {
            continue;
        };
        match key.as_atom() {
            Some("running_applications") => {
                status.running_applications = value
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|app| match app.as_tuple()? {
                        [name, description, version] => Some(Application {
                            name: text_of(name)?,
                            description: text_of(description)?,
                            version: text_of(version)?,
                        }),
                        _ => None,
                    })
                    .collect();
            }
            Some("nodes") => status.nodes = node_names(value),
            Some("running_nodes") => status.running_nodes = node_names(value),
            _ => {}
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::error::ClientError;
    use crate::executor::ExecutorConfig;
    use crate::reply::ErrorDetail;
    use otprpc_protocol::RpcRequest;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Answers calls from a queue of canned replies and records requests.
    #[derive(Clone, Default)]
    struct Scripted {
        replies: Arc<Mutex<VecDeque<Term>>>,
        requests: Arc<Mutex<Vec<RpcRequest>>>,
    }

    impl Connection for Scripted {
        fn send_rpc(&mut self, request: &RpcRequest) -> Result<(), ClientError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(())
        }

        fn receive_rpc(&mut self) -> Result<Term, ClientError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(ClientError::ConnectionClosed)
        }
    }

    impl ConnectionProvider for Scripted {
        type Connection = Scripted;

        fn acquire(&self) -> Result<Scripted, ClientError> {
            Ok(self.clone())
        }

        fn release(&self, _connection: Scripted) {}
    }

    fn admin(replies: Vec<Term>) -> (BrokerAdmin<Scripted>, Scripted) {
        let scripted = Scripted::default();
        scripted.replies.lock().unwrap().extend(replies);
        let admin = BrokerAdmin::new(RpcExecutor::new(ExecutorConfig::new(scripted.clone())));
        (admin, scripted)
    }

    fn last_request(scripted: &Scripted) -> RpcRequest {
        scripted.requests.lock().unwrap().last().cloned().unwrap()
    }

    fn charlist(s: &str) -> Term {
        Term::list(s.chars().map(|c| Term::Integer(c as i64)))
    }

    #[test]
    fn test_add_user_sends_binaries() {
        let (admin, scripted) = admin(vec![Term::atom("ok")]);
        admin.add_user("bob", "s3cret").unwrap();

        let req = last_request(&scripted);
        assert_eq!(req.module(), "rabbit_access_control");
        assert_eq!(req.function(), "add_user");
        assert_eq!(req.args(), &[Term::binary("bob"), Term::binary("s3cret")]);
    }

    #[test]
    fn test_list_users() {
        let (admin, _) = admin(vec![Term::list([
            Term::binary("guest"),
            Term::binary("bob"),
        ])]);
        assert_eq!(admin.list_users().unwrap(), vec!["guest", "bob"]);
    }

    #[test]
    fn test_list_users_unexpected_shape() {
        let (admin, _) = admin(vec![Term::Integer(3)]);
        let err = admin.list_users().unwrap_err();
        assert!(matches!(
            err,
            AdminError::UnexpectedReply { function: "list_users", .. }
        ));
    }

    #[test]
    fn test_remote_error_propagates_with_payload() {
        let (admin, _) = admin(vec![Term::tuple([
            Term::atom("error"),
            Term::tuple([Term::atom("no_such_user"), Term::binary("ghost")]),
        ])]);
        let err = admin.delete_user("ghost").unwrap_err();
        match err {
            AdminError::Rpc(RpcError::RemoteRpc(ErrorDetail::Tuple(reason))) => {
                assert!(reason[0].is_atom("no_such_user"));
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_ok_reply_is_unexpected() {
        let (admin, _) = admin(vec![Term::atom("maybe")]);
        let err = admin.add_vhost("/test").unwrap_err();
        assert!(matches!(
            err,
            AdminError::UnexpectedReply { module: "rabbit_access_control", function: "add_vhost", .. }
        ));
    }

    #[test]
    fn test_set_permissions_argument_order() {
        let (admin, scripted) = admin(vec![Term::atom("ok"), Term::atom("ok")]);
        admin
            .set_permissions("bob", "^conf$", "^read$", "^write$", None)
            .unwrap();
        let req = last_request(&scripted);
        assert_eq!(req.function(), "set_permissions");
        assert_eq!(
            req.args(),
            &[
                Term::binary("bob"),
                Term::binary("/"),
                Term::binary("^conf$"),
                Term::binary("^write$"),
                Term::binary("^read$"),
            ]
        );

        admin.clear_permissions("bob", Some("/dev")).unwrap();
        let req = last_request(&scripted);
        assert_eq!(req.args(), &[Term::binary("bob"), Term::binary("/dev")]);
    }

    #[test]
    fn test_list_permissions() {
        let (admin, scripted) = admin(vec![Term::list([Term::tuple([
            Term::binary("guest"),
            Term::binary(".*"),
            Term::binary(".*"),
            Term::binary("^amq\\."),
        ])])]);
        let perms = admin.list_permissions(Some("/dev")).unwrap();
        assert_eq!(
            perms,
            vec![Permission {
                name: "guest".into(),
                configure: ".*".into(),
                write: ".*".into(),
                read: "^amq\\.".into(),
            }]
        );
        assert_eq!(last_request(&scripted).function(), "list_vhost_permissions");
    }

    #[test]
    fn test_list_user_permissions_rejects_short_entries() {
        let (admin, _) = admin(vec![Term::list([Term::tuple([Term::binary("/")])])]);
        assert!(matches!(
            admin.list_user_permissions("guest").unwrap_err(),
            AdminError::UnexpectedReply { .. }
        ));
    }

    #[test]
    fn test_lifecycle_calls() {
        let (admin, scripted) = admin(vec![
            Term::atom("ok"),
            Term::atom("ok"),
            Term::atom("ok"),
            Term::atom("ok"),
            Term::atom("ok"),
        ]);
        admin.stop_broker_application().unwrap();
        admin.reset_node().unwrap();
        admin.force_reset_node().unwrap();
        admin.start_broker_application().unwrap();
        admin.stop_node().unwrap();

        let calls: Vec<_> = scripted
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| format!("{}:{}", r.module(), r.function()))
            .collect();
        assert_eq!(
            calls,
            vec![
                "rabbit:stop",
                "rabbit_mnesia:reset",
                "rabbit_mnesia:force_reset",
                "rabbit:start",
                "rabbit:stop_and_halt",
            ]
        );
    }

    #[test]
    fn test_stop_node_accepts_node_going_down() {
        let (admin, scripted) = admin(vec![Term::tuple([
            Term::atom("badrpc"),
            Term::atom("nodedown"),
        ])]);
        admin.stop_node().unwrap();
        assert_eq!(last_request(&scripted).function(), "stop_and_halt");
    }

    #[test]
    fn test_stop_node_accepts_dropped_connection() {
        // No reply at all: the connection closes under the call.
        let (admin, _) = admin(vec![]);
        admin.stop_node().unwrap();
    }

    #[test]
    fn test_stop_node_reports_remote_error() {
        let (admin, _) = admin(vec![Term::tuple([
            Term::atom("error"),
            Term::atom("not_allowed"),
        ])]);
        assert!(matches!(
            admin.stop_node().unwrap_err(),
            AdminError::Rpc(RpcError::RemoteRpc(_))
        ));
    }

    #[test]
    fn test_status() {
        let reply = Term::list([
            Term::tuple([
                Term::atom("running_applications"),
                Term::list([
                    Term::tuple([
                        Term::atom("rabbit"),
                        charlist("RabbitMQ"),
                        charlist("1.7.2"),
                    ]),
                    Term::tuple([
                        Term::atom("mnesia"),
                        charlist("MNESIA  CXC 138 12"),
                        charlist("4.4.12"),
                    ]),
                ]),
            ]),
            Term::tuple([
                Term::atom("nodes"),
                Term::list([Term::tuple([
                    Term::atom("disc"),
                    Term::list([Term::atom("rabbit@host")]),
                ])]),
            ]),
            Term::tuple([
                Term::atom("running_nodes"),
                Term::list([Term::atom("rabbit@host")]),
            ]),
        ]);
        let (admin, _) = admin(vec![reply]);
        let status = admin.status().unwrap();

        assert!(status.is_running());
        assert_eq!(status.running_applications.len(), 2);
        assert_eq!(status.running_applications[0].description, "RabbitMQ");
        assert_eq!(status.running_applications[0].version, "1.7.2");
        assert_eq!(status.nodes, vec!["rabbit@host"]);
        assert_eq!(status.running_nodes, vec!["rabbit@host"]);
    }

    #[test]
    fn test_status_of_stopped_app() {
        let reply = Term::list([Term::tuple([
            Term::atom("running_applications"),
            Term::nil(),
        ])]);
        let (admin, _) = admin(vec![reply]);
        let status = admin.status().unwrap();
        assert!(!status.is_running());
        assert!(status.nodes.is_empty());
    }
}
