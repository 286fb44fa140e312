//! Classification of RPC reply terms.
//!
//! A node answers every call with a single term. Two conventions mark a
//! failure: `{badrpc, Reason}` when the call could not be dispatched or crashed
//! inside the node's RPC machinery, and `{error, Reason}` when the called
//! function itself reported an error. Everything else is a successful result,
//! including replies that only look similar (wrong arity, non-atom head).
//!
//! The match is deliberately narrow. A function that legitimately returns
//! `{error, _}` as data is still reported as a remote error, since the wire
//! carries no way to tell the two apart.

use crate::error::RpcError;
use otprpc_protocol::Term;
use std::fmt;

/// Head atom of a dispatch-level failure.
pub const BADRPC: &str = "badrpc";

/// Head atom of an application-level failure.
pub const ERROR: &str = "error";

/// Payload of a failed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// The reason was a tuple; its elements are kept as-is.
    Tuple(Vec<Term>),
    /// Any other reason, rendered in Erlang syntax.
    Text(String),
}

impl ErrorDetail {
    pub fn as_tuple(&self) -> Option<&[Term]> {
        match self {
            ErrorDetail::Tuple(elements) => Some(elements),
            ErrorDetail::Text(_) => None,
        }
    }

    /// Rebuilds the payload as a term.
    pub fn to_term(&self) -> Term {
        match self {
            ErrorDetail::Tuple(elements) => Term::Tuple(elements.clone()),
            ErrorDetail::Text(text) => Term::String(text.clone()),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::Tuple(_) => write!(f, "{}", self.to_term()),
            ErrorDetail::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Classified reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Success(Term),
    RemoteError(ErrorDetail),
    TransportError(ErrorDetail),
}

impl RpcOutcome {
    /// Converts into the executor's result, mapping failures onto the typed errors.
    pub fn into_result(self) -> Result<Term, RpcError> {
        match self {
            RpcOutcome::Success(term) => Ok(term),
            RpcOutcome::RemoteError(detail) => Err(RpcError::RemoteRpc(detail)),
            RpcOutcome::TransportError(detail) => Err(RpcError::BadRpc(detail)),
        }
    }
}

#[derive(Clone, Copy)]
enum FailureKind {
    BadRpc,
    Error,
}

fn failure_kind(elements: &[Term]) -> Option<FailureKind> {
    match elements {
        [Term::Atom(head), _, ..] if head == BADRPC => Some(FailureKind::BadRpc),
        [Term::Atom(head), _, ..] if head == ERROR => Some(FailureKind::Error),
        _ => None,
    }
}

/// Classifies a reply term without touching the network.
///
/// Only the head atom and the second element are inspected; tuples with fewer
/// than two elements are passed through as successes.
pub fn interpret(reply: Term) -> RpcOutcome {
    let mut elements = match reply {
        Term::Tuple(elements) => elements,
        other => return RpcOutcome::Success(other),
    };

    let Some(kind) = failure_kind(&elements) else {
        return RpcOutcome::Success(Term::Tuple(elements));
    };

    let detail = match elements.swap_remove(1) {
        Term::Tuple(reason) => ErrorDetail::Tuple(reason),
        reason => ErrorDetail::Text(reason.to_string()),
    };

    match kind {
        FailureKind::BadRpc => RpcOutcome::TransportError(detail),
        FailureKind::Error => RpcOutcome::RemoteError(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn undef_exit() -> Term {
        Term::tuple([
            Term::atom("EXIT"),
            Term::tuple([
                Term::atom("undef"),
                Term::list([Term::tuple([
                    Term::atom("rabbit_access_control"),
                    Term::atom("list_users"),
                    Term::list([Term::nil()]),
                ])]),
            ]),
        ])
    }

    #[test]
    fn test_badrpc_with_tuple_reason() {
        let reply = Term::tuple([Term::atom("badrpc"), undef_exit()]);
        match interpret(reply) {
            RpcOutcome::TransportError(ErrorDetail::Tuple(elements)) => {
                assert_eq!(Term::Tuple(elements), undef_exit());
            }
            other => panic!("expected tuple transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_badrpc_with_atom_reason() {
        let reply = Term::tuple([Term::atom("badrpc"), Term::atom("nodedown")]);
        assert_eq!(
            interpret(reply),
            RpcOutcome::TransportError(ErrorDetail::Text("nodedown".into()))
        );
    }

    #[test]
    fn test_error_with_tuple_reason() {
        let reason = Term::tuple([Term::atom("no_such_user"), Term::binary("bob")]);
        let reply = Term::tuple([Term::atom("error"), reason.clone()]);
        assert_eq!(
            interpret(reply),
            RpcOutcome::RemoteError(ErrorDetail::Tuple(vec![
                Term::atom("no_such_user"),
                Term::binary("bob"),
            ]))
        );
    }

    #[test]
    fn test_error_with_non_tuple_reason_uses_text_form() {
        let reply = Term::tuple([Term::atom("error"), Term::binary("vhost in use")]);
        assert_eq!(
            interpret(reply),
            RpcOutcome::RemoteError(ErrorDetail::Text("<<\"vhost in use\">>".into()))
        );

        let reply = Term::tuple([Term::atom("error"), Term::list([Term::Integer(1)])]);
        assert_eq!(
            interpret(reply),
            RpcOutcome::RemoteError(ErrorDetail::Text("[1]".into()))
        );
    }

    #[test]
    fn test_short_tuples_are_success() {
        let empty = Term::Tuple(vec![]);
        assert_eq!(interpret(empty.clone()), RpcOutcome::Success(empty));

        let lone = Term::tuple([Term::atom("badrpc")]);
        assert_eq!(interpret(lone.clone()), RpcOutcome::Success(lone));

        let lone = Term::tuple([Term::atom("error")]);
        assert_eq!(interpret(lone.clone()), RpcOutcome::Success(lone));
    }

    #[test]
    fn test_other_heads_are_success() {
        let ok = Term::tuple([Term::atom("ok"), Term::Integer(1)]);
        assert_eq!(interpret(ok.clone()), RpcOutcome::Success(ok));

        let string_head = Term::tuple([Term::string("error"), Term::atom("x")]);
        assert_eq!(interpret(string_head.clone()), RpcOutcome::Success(string_head));

        let binary_head = Term::tuple([Term::binary("badrpc"), Term::atom("x")]);
        assert_eq!(interpret(binary_head.clone()), RpcOutcome::Success(binary_head));
    }

    #[test]
    fn test_list_shaped_like_error_is_success() {
        let reply = Term::list([Term::atom("error"), Term::atom("x")]);
        assert_eq!(interpret(reply.clone()), RpcOutcome::Success(reply));
    }

    #[test]
    fn test_longer_tuples_use_second_element() {
        let reply = Term::tuple([
            Term::atom("error"),
            Term::atom("timeout"),
            Term::Integer(5000),
        ]);
        assert_eq!(
            interpret(reply),
            RpcOutcome::RemoteError(ErrorDetail::Text("timeout".into()))
        );
    }

    #[test]
    fn test_into_result() {
        assert_eq!(
            RpcOutcome::Success(Term::atom("ok")).into_result().unwrap(),
            Term::atom("ok")
        );
        assert!(matches!(
            RpcOutcome::RemoteError(ErrorDetail::Text("x".into())).into_result(),
            Err(RpcError::RemoteRpc(_))
        ));
        assert!(matches!(
            RpcOutcome::TransportError(ErrorDetail::Text("x".into())).into_result(),
            Err(RpcError::BadRpc(_))
        ));
    }

    #[test]
    fn test_detail_display_and_term() {
        let detail = ErrorDetail::Tuple(vec![Term::atom("EXIT"), Term::atom("killed")]);
        assert_eq!(detail.to_string(), "{'EXIT',killed}");
        assert_eq!(
            detail.to_term(),
            Term::tuple([Term::atom("EXIT"), Term::atom("killed")])
        );
        assert_eq!(detail.as_tuple().map(|e| e.len()), Some(2));

        let detail = ErrorDetail::Text("nodedown".into());
        assert!(detail.as_tuple().is_none());
        assert_eq!(detail.to_term(), Term::string("nodedown"));
    }

    fn arb_leaf() -> impl Strategy<Value = Term> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(Term::Atom),
            any::<i64>().prop_map(Term::Integer),
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(Term::Binary),
            "[a-z ]{0,8}".prop_map(Term::String),
        ]
    }

    fn arb_term() -> impl Strategy<Value = Term> {
        arb_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Term::Tuple),
                proptest::collection::vec(inner, 0..4).prop_map(Term::List),
            ]
        })
    }

    fn arb_non_tuple() -> impl Strategy<Value = Term> {
        prop_oneof![
            arb_leaf(),
            proptest::collection::vec(arb_term(), 0..4).prop_map(Term::List),
        ]
    }

    fn arb_non_atom() -> impl Strategy<Value = Term> {
        arb_term().prop_filter("head must not be an atom", |t| t.as_atom().is_none())
    }

    proptest! {
        #[test]
        fn prop_non_tuples_pass_through(term in arb_non_tuple()) {
            prop_assert_eq!(interpret(term.clone()), RpcOutcome::Success(term));
        }

        #[test]
        fn prop_non_atom_heads_pass_through(
            head in arb_non_atom(),
            rest in proptest::collection::vec(arb_term(), 0..3),
        ) {
            let mut elements = vec![head];
            elements.extend(rest);
            let reply = Term::Tuple(elements);
            prop_assert_eq!(interpret(reply.clone()), RpcOutcome::Success(reply));
        }

        #[test]
        fn prop_badrpc_tuple_payload_is_preserved(
            inner in proptest::collection::vec(arb_term(), 0..4),
        ) {
            let reply = Term::tuple([Term::atom(BADRPC), Term::Tuple(inner.clone())]);
            prop_assert_eq!(
                interpret(reply),
                RpcOutcome::TransportError(ErrorDetail::Tuple(inner))
            );
        }

        #[test]
        fn prop_error_tuple_payload_is_preserved(
            inner in proptest::collection::vec(arb_term(), 0..4),
        ) {
            let reply = Term::tuple([Term::atom(ERROR), Term::Tuple(inner.clone())]);
            prop_assert_eq!(
                interpret(reply),
                RpcOutcome::RemoteError(ErrorDetail::Tuple(inner))
            );
        }

        #[test]
        fn prop_badrpc_text_payload_is_display_form(reason in arb_non_tuple()) {
            let expected = reason.to_string();
            let reply = Term::tuple([Term::atom(BADRPC), reason]);
            prop_assert_eq!(
                interpret(reply),
                RpcOutcome::TransportError(ErrorDetail::Text(expected))
            );
        }

        #[test]
        fn prop_tuple_detail_displays_like_term(
            inner in proptest::collection::vec(arb_term(), 0..4),
        ) {
            let detail = ErrorDetail::Tuple(inner.clone());
            prop_assert_eq!(detail.to_string(), Term::Tuple(inner).to_string());
        }

        #[test]
        fn prop_error_text_payload_is_display_form(reason in arb_non_tuple()) {
            let expected = reason.to_string();
            let reply = Term::tuple([Term::atom(ERROR), reason]);
            prop_assert_eq!(
                interpret(reply),
                RpcOutcome::RemoteError(ErrorDetail::Text(expected))
            );
        }
    }
}
