use futures::{SinkExt, StreamExt};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_util::codec::Framed;

use crate::domain::federation::codec::FederationCodec;
use crate::domain::federation::protocol::{Envelope, FederationRequest, FederationResponse, RemoteFailureKind};
use crate::domain::federation::remote_facade::RemoteFacade;

type ServerCodec = FederationCodec<Envelope<FederationResponse>, Envelope<FederationRequest>>;

/// Accepts federation connections and answers them through the remote facade.
pub struct FederationServer {
    listener: TcpListener,
    facade: Arc<RemoteFacade>,
    shutdown: Arc<Notify>,
}

impl FederationServer {
    pub async fn bind(address: SocketAddr, facade: Arc<RemoteFacade>) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(FederationServer { listener, facade, shutdown: Arc::new(Notify::new()) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle that stops [`run`](Self::run) when notified, even if notified
    /// before `run` starts waiting.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub async fn run(self) {
        log::info!("Federation server of {} listening on {:?}.", self.facade.local_member(), self.listener.local_addr());

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let facade = self.facade.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, facade).await {
                                log::warn!("Federation connection from {} ended with an error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => log::error!("Failed to accept federation connection: {}", e),
                },
                _ = self.shutdown.notified() => break,
            }
        }

        log::info!("Federation server stopped.");
    }
}

async fn serve_connection(stream: TcpStream, facade: Arc<RemoteFacade>) -> io::Result<()> {
    let mut framed = Framed::new(stream, ServerCodec::new());

    while let Some(frame) = framed.next().await {
        let envelope = frame?;
        let local_member = facade.local_member().clone();

        let response = if envelope.target_id != local_member {
            FederationResponse::failed(
                RemoteFailureKind::Rejected,
                format!("this is member {}, not {}", local_member, envelope.target_id),
            )
        } else {
            let facade = facade.clone();
            let sender = envelope.sender_id.clone();
            let request = envelope.payload;
            // Facade calls take order locks and may call clouds synchronously.
            tokio::task::spawn_blocking(move || facade.handle(&sender, request))
                .await
                .unwrap_or_else(|e| FederationResponse::failed(RemoteFailureKind::Unexpected, e.to_string()))
        };

        framed.send(Envelope::new(local_member, envelope.sender_id, response)).await?;
    }

    Ok(())
}
