use futures_util::{SinkExt, StreamExt};
use tokio::io;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use launcher_core::proto::{Envelope, Outbound, Request, Response};

pub type FramedStream = Framed<tokio::net::UnixStream, LengthDelimitedCodec>;

pub fn framed(stream: tokio::net::UnixStream) -> FramedStream {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub async fn send_request(framed: &mut FramedStream, req: &Envelope<Request>) -> io::Result<()> {
    let bytes = serde_json::to_vec(req)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    framed.send(bytes.into()).await
}

/// Daemon side: `None` when the peer hung up cleanly.
pub async fn read_request(framed: &mut FramedStream) -> io::Result<Option<Envelope<Request>>> {
    let Some(frame) = framed.next().await else {
        return Ok(None);
    };
    let frame = frame?;

    serde_json::from_slice::<Envelope<Request>>(&frame)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub async fn send_outbound(framed: &mut FramedStream, out: &Outbound) -> io::Result<()> {
    let bytes = serde_json::to_vec(out)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    framed.send(bytes.into()).await
}

pub async fn read_outbound(framed: &mut FramedStream) -> io::Result<Outbound> {
    let frame = framed
        .next()
        .await
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "socket closed"))??;

    serde_json::from_slice::<Outbound>(&frame)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Client side, for commands that never stream events. An event frame here
/// means the caller should have used `read_outbound`.
pub async fn read_response(framed: &mut FramedStream) -> io::Result<Envelope<Response>> {
    match read_outbound(framed).await? {
        Outbound::Response(envelope) => Ok(envelope),
        Outbound::Event(_) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "expected a response frame, got an event",
        )),
    }
}
