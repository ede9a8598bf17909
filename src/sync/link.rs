//! The uplink session.
//!
//! One TCP connection, one sequential read loop. Each inbound line is fully
//! handled (core and modules) before the next is read. However the session
//! ends, we try to say goodbye with `SQ`.

use crate::config::Config;
use crate::db::ServiceStore;
use crate::error::LinkError;
use crate::metrics;
use crate::security::TrustCheck;
use crate::services::ModuleRouter;
use crate::state::StateStore;
use crate::sync::context::{LinkContext, now};
use crate::sync::handshake::HandshakeMachine;
use crate::sync::protocol::Dispatcher;
use crate::sync::writer::{FramedWriter, LineWriter};
use crate::telemetry::spans;
use futures_util::StreamExt;
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::{Instrument, debug, info, trace};

/// Connect to the configured uplink and run the session until it ends or
/// `shutdown` resolves.
pub async fn run_link<F>(
    config: &Config,
    state: Arc<StateStore>,
    store: Arc<dyn ServiceStore>,
    modules: ModuleRouter,
    trust: Arc<TrustCheck>,
    shutdown: F,
) -> Result<(), LinkError>
where
    F: Future<Output = ()> + Send,
{
    let started = now();
    let span = spans::link(&config.server.numeric, &config.server.name);

    async move {
        info!(address = %config.uplink.address, "Connecting to uplink");
        let stream = TcpStream::connect(config.uplink.address.as_str()).await?;
        let (read_half, write_half) = stream.into_split();
        let writer: Arc<dyn LineWriter> = Arc::new(FramedWriter::new(write_half));

        let ctx = LinkContext::new(
            config.server.numeric.clone(),
            config.server.name.clone(),
            state,
            store,
            writer,
        );
        let handshake = HandshakeMachine::new(
            config.server.numeric.clone(),
            config.server.name.clone(),
            config.server.description.clone(),
            config.server.max_clients.clone(),
            config.uplink.password.clone(),
        );
        let dispatcher = Dispatcher::new(modules, handshake, trust);

        run_session(read_half, &ctx, dispatcher, started, shutdown).await
    }
    .instrument(span)
    .await
}

/// Start the link over an established connection, serve it, and send the
/// farewell `SQ` whatever the outcome.
pub async fn run_session<R, F>(
    reader: R,
    ctx: &LinkContext,
    mut dispatcher: Dispatcher,
    started: i64,
    shutdown: F,
) -> Result<(), LinkError>
where
    R: AsyncRead + Unpin + Send,
    F: Future<Output = ()> + Send,
{
    let result = match dispatcher.start(ctx, started).await {
        Ok(()) => serve(reader, ctx, &mut dispatcher, shutdown).await,
        Err(e) => Err(e),
    };

    let reason = match &result {
        Ok(()) => "Services shutting down".to_string(),
        Err(e) => e.farewell_reason(),
    };
    if let Err(e) = ctx
        .send(format!("{} SQ {} 0 :{}", ctx.numeric, ctx.server_name, reason))
        .await
    {
        debug!(error = %e, "Farewell not delivered");
    }
    result
}

async fn serve<R, F>(
    reader: R,
    ctx: &LinkContext,
    dispatcher: &mut Dispatcher,
    shutdown: F,
) -> Result<(), LinkError>
where
    R: AsyncRead + Unpin + Send,
    F: Future<Output = ()> + Send,
{
    // Hubs relay raw bytes; framing on `\n` keeps a stray Latin-1 byte from
    // ending the session.
    let codec = AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec());
    let mut lines = FramedRead::new(reader, codec);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return Ok(());
            }
            next = lines.next() => match next {
                Some(Ok(bytes)) => {
                    let line = String::from_utf8_lossy(&bytes);
                    if matches!(line, Cow::Owned(_)) {
                        debug!(line = %line, "Inbound line is not UTF-8");
                    }
                    trace!(line = %line, "<-");
                    dispatcher.dispatch(ctx, &line).await?;
                    metrics::set_state_gauges(ctx.state.user_count(), ctx.state.channel_count());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(LinkError::Closed),
            }
        }
    }
}
