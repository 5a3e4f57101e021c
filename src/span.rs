use actix::prelude::*;
use async_trait::async_trait;
use pin_project::pin_project;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tracing::Span;

/// Message with span used for trace logging
pub struct SpanMessage<I> {
    pub msg: I,
    pub span: Span,
}

impl<M> SpanMessage<M> {
    pub fn new(msg: M) -> Self {
        Self {
            msg,
            span: Span::current(),
        }
    }
}

impl<M, R: 'static> Message for SpanMessage<M>
where
    M: Message<Result = R>,
{
    type Result = R;
}

#[async_trait]
pub trait AsyncSpanHandler<M>
where
    Self: Actor,
    M: Message,
{
    async fn handle(msg: M) -> <M as Message>::Result;
}

/// ActorFuture wrapper that enters span before polling future
#[pin_project]
#[derive(Debug)]
pub struct ActorFutureSpanWrap<F> {
    #[pin]
    inner: F,
    span: Span,
}

impl<F> ActorFutureSpanWrap<F> {
    pub fn new(inner: F, span: Span) -> Self {
        Self { inner, span }
    }
}

impl<A: Actor, F: ActorFuture<A>> ActorFuture<A> for ActorFutureSpanWrap<F> {
    type Output = F::Output;

    fn poll(
        self: Pin<&mut Self>,
        actor: &mut A,
        ctx: &mut A::Context,
        task: &mut TaskContext<'_>,
    ) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll(actor, ctx, task)
    }
}

#[macro_export]
macro_rules! span_message_async_impl {
    ($message_type:ident, $actor:ident) => {
        impl actix::Handler<$crate::span::SpanMessage<$message_type>> for $actor {
            type Result =
                actix::ResponseActFuture<Self, <$message_type as actix::Message>::Result>;
            fn handle(
                &mut self,
                msg: $crate::span::SpanMessage<$message_type>,
                _ctx: &mut actix::Context<Self>,
            ) -> Self::Result {
                use actix_interop::FutureInterop;
                use tracing_futures::Instrument;
                let $crate::span::SpanMessage { span, msg } = msg;
                <Self as $crate::span::AsyncSpanHandler<$message_type>>::handle(msg)
                    .instrument(span)
                    .interop_actor_boxed(self)
            }
        }
    };
}

#[macro_export]
macro_rules ! async_message_handler_with_span {
    (impl AsyncSpanHandler<$M:ident> for $A:ident $t:tt) => {
        $crate::span_message_async_impl!($M, $A);
        #[async_trait::async_trait]
        impl $crate::span::AsyncSpanHandler<$M> for $A
            $t

    }
}
