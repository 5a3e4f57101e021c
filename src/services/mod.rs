//! Engine operations. Each one takes the caller explicitly, checks what only
//! depends on the caller and hands the transactional part to the
//! [`DbExecutor`].

use crate::db::DbExecutor;
use crate::error::Error;
use crate::span::SpanMessage;
use actix::prelude::*;

pub mod place;
pub mod poll;
pub mod user;
pub mod vote;

/// Sends `msg` to the registered [`DbExecutor`] within the current span
pub async fn execute<M, T>(msg: M) -> Result<T, Error>
where
    M: Message<Result = Result<T, Error>> + Send + 'static,
    T: Send + 'static,
    DbExecutor: Handler<SpanMessage<M>>,
{
    DbExecutor::from_registry()
        .send(SpanMessage::new(msg))
        .await?
}
