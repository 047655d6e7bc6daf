//! Cadence-specific reply handling, selected once per call.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use log::error;
use tokio::runtime::Handle;

use crate::{
    codec::Payload,
    descriptor::RpcType,
    invoker::Reply,
    observer::{ResponseObserver, StreamObserver},
    panic::format_panic,
    status::Status,
};

pub(crate) enum Cadence<M> {
    Unary,
    ServerStream,
    /// Client or bidi streaming. `requests` is filled in by the invoker's
    /// reply.
    Streaming {
        requests: Option<Box<dyn StreamObserver<M>>>,
    },
}

impl<M: Payload> Cadence<M> {
    pub(crate) fn for_rpc_type(rpc_type: RpcType) -> Self {
        match rpc_type {
            RpcType::Unary => Self::Unary,
            RpcType::ServerStream => Self::ServerStream,
            RpcType::ClientStream | RpcType::BiStream => Self::Streaming { requests: None },
        }
    }

    /// Streaming cadences dispatch on the first message and keep accepting
    /// messages afterwards.
    pub(crate) fn is_streaming(&self) -> bool { matches!(self, Self::Streaming { .. }) }

    /// Whether business logic writes responses through a responder rather
    /// than a returned value.
    pub(crate) fn uses_responder(&self) -> bool { !matches!(self, Self::Unary) }

    fn name(&self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ServerStream => "server-streaming",
            Self::Streaming { .. } => "streaming",
        }
    }

    /// Act on the invoker's reply.
    pub(crate) fn accept(
        &mut self,
        reply: Reply<M>,
        responder: &ResponseObserver<M>,
        runtime: &Handle,
    ) -> Result<(), Status> {
        match (self, reply) {
            (Self::Unary, Reply::Value(value)) => {
                responder.on_next(value);
                responder.on_completed();
                Ok(())
            }
            (Self::Unary, Reply::Pending(future)) => {
                let responder = responder.clone();
                runtime.spawn(async move {
                    match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(Ok(value)) => {
                            responder.on_next(value);
                            responder.on_completed();
                        }
                        Ok(Err(e)) => {
                            error!("pending invocation failed: {e}");
                            responder.on_error(e.into_status());
                        }
                        Err(panic) => {
                            let panic = format_panic(panic);
                            error!("pending invocation panicked: {panic}");
                            responder.on_error(panic.into_status("Invoke failed"));
                        }
                    }
                });
                Ok(())
            }
            (Self::Unary, Reply::Empty) => Err(Status::internal().with_description("Missing response")),
            (Self::ServerStream, Reply::Empty) => Ok(()),
            (Self::Streaming { requests }, Reply::Requests(observer)) => {
                *requests = Some(observer);
                Ok(())
            }
            (cadence, reply) => Err(Status::internal().with_description(format!(
                "unexpected {reply:?} reply for a {} call",
                cadence.name()
            ))),
        }
    }

    pub(crate) fn forward(&mut self, value: M) {
        if let Self::Streaming {
            requests: Some(requests),
        } = self
        {
            requests.on_next(value);
        }
    }

    pub(crate) fn complete_requests(&mut self) {
        if let Self::Streaming {
            requests: Some(requests),
        } = self
        {
            requests.on_completed();
        }
    }

    pub(crate) fn cancel_requests(&mut self, status: Status) {
        if let Self::Streaming {
            requests: Some(requests),
        } = self
        {
            requests.on_error(status);
        }
    }
}
