//! Connection-level tests: call correlation and close behavior over an
//! in-memory pipe.

mod helper;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use helper::{NullHandler, connect_pair};
use lsp_mux::rpc::{Connection, Error, Handler, Outcome, Request, respond_async};

struct Echo;

#[async_trait]
impl Handler for Echo {
    async fn handle(&self, _conn: &Connection, req: Request) -> Result<Outcome, Error> {
        if req.method == "fail" {
            return Err(Error::invalid_params("scripted failure"));
        }
        Ok(Outcome::Reply(req.params.unwrap_or(Value::Null)))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn calls_resolve_with_the_peer_reply() {
    let (caller, _peer) = connect_pair(Arc::new(NullHandler), Arc::new(Echo));

    let result = caller.call("echo", Some(json!({"n": 1}))).await.unwrap();
    assert_eq!(result, json!({"n": 1}));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_calls_correlate_by_id() {
    let (caller, _peer) = connect_pair(Arc::new(NullHandler), Arc::new(Echo));

    let (a, b) = tokio::join!(
        caller.call("echo", Some(json!("first"))),
        caller.call("echo", Some(json!("second"))),
    );
    assert_eq!(a.unwrap(), json!("first"));
    assert_eq!(b.unwrap(), json!("second"));
}

#[tokio::test(flavor = "multi_thread")]
async fn peer_errors_surface_as_response_errors() {
    let (caller, _peer) = connect_pair(Arc::new(NullHandler), Arc::new(Echo));

    let err = caller.call("fail", None).await.unwrap_err();
    let Error::Response(error) = err else {
        panic!("expected a response error, got {err}");
    };
    assert_eq!(error.code, -32602);
}

struct Exploding;

#[async_trait]
impl Handler for Exploding {
    async fn handle(&self, conn: &Connection, req: Request) -> Result<Outcome, Error> {
        let id = req.id.expect("calls only");
        respond_async(conn, id, async { panic!("handler body blew up") });
        Ok(Outcome::Pending)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn panicking_async_responders_still_answer_the_call() {
    let (caller, _peer) = connect_pair(Arc::new(NullHandler), Arc::new(Exploding));

    let err = caller.call("boom", None).await.unwrap_err();
    let Error::Response(error) = err else {
        panic!("expected a response error, got {err}");
    };
    assert_eq!(error.code, -32603);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_fails_in_flight_and_later_calls() {
    // the peer never answers, so the call stays pending until close
    let (caller, _peer) = connect_pair(Arc::new(NullHandler), Arc::new(NullHandler));

    let in_flight = tokio::spawn({
        let caller = caller.clone();
        async move { caller.call("hang", None).await }
    });
    tokio::task::yield_now().await;

    caller.close();
    assert!(matches!(in_flight.await.unwrap(), Err(Error::Closed)));
    assert!(matches!(caller.call("late", None).await, Err(Error::Closed)));
}
