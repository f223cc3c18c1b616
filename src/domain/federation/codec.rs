use bytes::{Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Length-delimited framing carrying one bincode value per frame.
///
/// `Out` is what this side writes, `In` what it reads: the client encodes
/// requests and decodes responses, the server the other way round.
pub struct FederationCodec<Out, In> {
    codec: LengthDelimitedCodec,
    _marker: PhantomData<fn(Out) -> In>,
}

impl<Out, In> FederationCodec<Out, In> {
    pub fn new() -> Self {
        Self { codec: LengthDelimitedCodec::new(), _marker: PhantomData }
    }
}

impl<Out, In> Default for FederationCodec<Out, In> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Out: Serialize, In> Encoder<Out> for FederationCodec<Out, In> {
    type Error = io::Error;

    fn encode(&mut self, item: Out, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = bincode::serialize(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.codec.encode(Bytes::from(bytes), dst)
    }
}

impl<Out, In: DeserializeOwned> Decoder for FederationCodec<Out, In> {
    type Item = In;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.codec.decode(src)? {
            Some(frame) => {
                let item = bincode::deserialize(&frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::federation::protocol::{Envelope, FederationRequest, FederationResponse};
    use crate::domain::order::identity::RequesterIdentity;
    use crate::domain::order::order::Order;
    use crate::domain::order::resource::ResourceSpec;
    use crate::domain::utils::id::{CloudName, MemberId, OrderId};

    type ClientCodec = FederationCodec<Envelope<FederationRequest>, Envelope<FederationResponse>>;
    type ServerCodec = FederationCodec<Envelope<FederationResponse>, Envelope<FederationRequest>>;

    #[test]
    fn request_frame_decodes_on_the_server_side() {
        let order = Order::new(
            OrderId::new("o-1"),
            ResourceSpec::Attachment {
                compute_order_id: OrderId::new("c-1"),
                volume_order_id: OrderId::new("v-1"),
                device: None,
            },
            MemberId::new("site-a"),
            MemberId::new("site-b"),
            CloudName::new("default"),
            RequesterIdentity::new("alice", "ldap", "token"),
        )
        .with_requirement("zone", "east");

        let mut buffer = BytesMut::new();
        ClientCodec::new()
            .encode(
                Envelope::new(MemberId::new("site-a"), MemberId::new("site-b"), FederationRequest::CreateOrder {
                    order: order.clone(),
                }),
                &mut buffer,
            )
            .unwrap();

        // A partial frame is not decoded yet.
        let mut partial = buffer.split_to(buffer.len() - 1);
        let mut server = ServerCodec::new();
        assert!(server.decode(&mut partial).unwrap().is_none());
        partial.unsplit(buffer);

        let envelope = server.decode(&mut partial).unwrap().unwrap();
        assert_eq!(envelope.sender_id, MemberId::new("site-a"));
        match envelope.payload {
            FederationRequest::CreateOrder { order: received } => assert_eq!(received, order),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn garbage_frames_are_invalid_data() {
        let mut buffer = BytesMut::new();
        LengthDelimitedCodec::new().encode(Bytes::from_static(&[0xff, 0xff, 0xff]), &mut buffer).unwrap();

        let err = ServerCodec::new().decode(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
