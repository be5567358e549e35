//! Loopback gRPC client used by the gateway.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use http::uri::PathAndQuery;
use http::HeaderMap;
use tonic::codec::ProstCodec;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use crate::lifecycle::StartupError;
use crate::middleware::FROM_GATEWAY_HEADER;

/// Prefix of HTTP headers forwarded as gRPC metadata (prefix stripped).
pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";

/// HTTP headers forwarded verbatim.
const FORWARDED_HEADERS: &[&str] = &["authorization", "x-request-id"];

/// One HTTP/2 connection to the local RPC listener, shared by all routes.
#[derive(Clone, Debug)]
pub struct LoopbackClient {
    channel: Channel,
    target: SocketAddr,
}

impl LoopbackClient {
    /// Connect to the RPC listener bound at `addr`.
    pub async fn dial(addr: SocketAddr) -> Result<Self, StartupError> {
        let target = loopback_target(addr);
        let dial_err = |source| StartupError::Dial {
            addr: target,
            source,
        };

        let channel = Endpoint::from_shared(format!("http://{}", target))
            .map_err(dial_err)?
            .connect()
            .await
            .map_err(dial_err)?;

        Ok(Self { channel, target })
    }

    /// Client that connects on first use.
    pub fn lazy(addr: SocketAddr) -> Result<Self, StartupError> {
        let target = loopback_target(addr);
        let channel = Endpoint::from_shared(format!("http://{}", target))
            .map_err(|source| StartupError::Dial {
                addr: target,
                source,
            })?
            .connect_lazy();
        Ok(Self { channel, target })
    }

    /// Address the client is connected to.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Underlying channel, for generated tonic clients.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Issue one unary call marked as gateway-originated.
    pub async fn unary<Req, Resp>(
        &self,
        path: &str,
        message: Req,
        headers: &HeaderMap,
    ) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let path = PathAndQuery::try_from(path)
            .map_err(|e| Status::internal(format!("invalid grpc path {:?}: {}", path, e)))?;

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {}", e)))?;

        let mut request = tonic::Request::new(message);
        request
            .metadata_mut()
            .insert(FROM_GATEWAY_HEADER, MetadataValue::from_static("true"));
        forward_headers(headers, request.metadata_mut());

        let codec = ProstCodec::<Req, Resp>::default();
        let response = grpc.unary(request, path, codec).await?;
        Ok(response.into_inner())
    }
}

/// Map a wildcard bind address to the matching loopback address.
pub fn loopback_target(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

/// Copy auth and `grpc-metadata-*` headers into request metadata.
pub fn forward_headers(headers: &HeaderMap, metadata: &mut MetadataMap) {
    for (name, value) in headers {
        let name = name.as_str();
        let key = if FORWARDED_HEADERS.contains(&name) {
            name
        } else if let Some(stripped) = name.strip_prefix(METADATA_HEADER_PREFIX) {
            stripped
        } else {
            continue;
        };

        let (Ok(key), Ok(value)) = (
            AsciiMetadataKey::from_bytes(key.as_bytes()),
            AsciiMetadataValue::try_from(value.as_bytes()),
        ) else {
            continue;
        };
        metadata.append(key, value);
    }
}
