use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::codec::Framed;

use crate::domain::connector::remote_connector::RemoteTransport;
use crate::domain::federation::codec::FederationCodec;
use crate::domain::federation::protocol::{Envelope, FederationRequest, FederationResponse};
use crate::domain::order::instance::OrderInstance;
use crate::domain::order::order::Order;
use crate::domain::utils::id::{InstanceId, MemberId, OrderId};
use crate::error::{Error, Result};

type ClientCodec = FederationCodec<Envelope<FederationRequest>, Envelope<FederationResponse>>;

/// Blocking federation client for the processor threads.
///
/// Each call opens a connection to the provider, sends one request frame and
/// waits for the answer, bounded by the request timeout. It must not be
/// called from inside an async context.
pub struct TcpFederationClient {
    local_member: MemberId,
    members: HashMap<MemberId, SocketAddr>,
    request_timeout: Duration,
    runtime: Option<Runtime>,
}

impl TcpFederationClient {
    pub fn new(
        local_member: MemberId,
        members: HashMap<MemberId, SocketAddr>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("federation-client")
            .enable_all()
            .build()?;

        Ok(TcpFederationClient { local_member, members, request_timeout, runtime: Some(runtime) })
    }

    fn unreachable(member: &MemberId, reason: impl Into<String>) -> Error {
        Error::RemoteUnreachable { member: member.clone(), reason: reason.into() }
    }

    fn call(&self, member: &MemberId, request: FederationRequest) -> Result<FederationResponse> {
        let address =
            *self.members.get(member).ok_or_else(|| Self::unreachable(member, "member is not part of the federation"))?;
        let runtime = self.runtime.as_ref().ok_or_else(|| Self::unreachable(member, "client is shut down"))?;

        let envelope = Envelope::new(self.local_member.clone(), member.clone(), request);
        let exchanged = runtime.block_on(async { tokio::time::timeout(self.request_timeout, exchange(address, envelope)).await });

        match exchanged {
            Err(_elapsed) => Err(Self::unreachable(
                member,
                format!("no answer from {} within {:?}", address, self.request_timeout),
            )),
            Ok(Err(e)) => Err(Self::unreachable(member, format!("{} ({})", e, address))),
            Ok(Ok(response)) => {
                if response.sender_id != *member {
                    return Err(Self::unreachable(
                        member,
                        format!("answer from {} came from member {}", address, response.sender_id),
                    ));
                }
                Ok(response.payload)
            }
        }
    }

    fn unexpected(member: &MemberId, response: FederationResponse) -> Error {
        Error::Unexpected(format!("member {} sent an unexpected answer: {:?}", member, response))
    }
}

async fn exchange(address: SocketAddr, envelope: Envelope<FederationRequest>) -> io::Result<Envelope<FederationResponse>> {
    let stream = TcpStream::connect(address).await?;
    let mut framed = Framed::new(stream, ClientCodec::new());
    framed.send(envelope).await?;

    match framed.next().await {
        Some(frame) => frame,
        None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the connection without answering")),
    }
}

impl RemoteTransport for TcpFederationClient {
    fn create_order(&self, member: &MemberId, order: &Order) -> Result<InstanceId> {
        match self.call(member, FederationRequest::CreateOrder { order: order.clone() })? {
            FederationResponse::Created { instance_id } => Ok(instance_id),
            FederationResponse::Failed { kind, message } => Err(kind.into_cloud_error(message).into()),
            other => Err(Self::unexpected(member, other)),
        }
    }

    fn get_instance(&self, member: &MemberId, order_id: &OrderId) -> Result<OrderInstance> {
        match self.call(member, FederationRequest::GetInstance { order_id: order_id.clone() })? {
            FederationResponse::Instance { instance } => Ok(instance),
            FederationResponse::Failed { kind, message } => Err(kind.into_cloud_error(message).into()),
            other => Err(Self::unexpected(member, other)),
        }
    }

    fn delete_order(&self, member: &MemberId, order_id: &OrderId) -> Result<()> {
        match self.call(member, FederationRequest::DeleteOrder { order_id: order_id.clone() })? {
            FederationResponse::Deleted => Ok(()),
            FederationResponse::Failed { kind, message } => Err(kind.into_cloud_error(message).into()),
            other => Err(Self::unexpected(member, other)),
        }
    }
}

impl Drop for TcpFederationClient {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
