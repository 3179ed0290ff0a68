//! gRPC transport for the controller API.
//!
//! A hand-written tonic client for the three `Controller2` methods the agent
//! uses. Messages are the prost structs in `debuglet_core::v2`.

use std::time::Duration;

use async_trait::async_trait;
use debuglet_core::error::{DebugletError, Result};
use debuglet_core::v2::{
    ListActiveBreakpointsRequest, ListActiveBreakpointsResponse, RegisterDebuggeeRequest,
    RegisterDebuggeeResponse, UpdateActiveBreakpointRequest, UpdateActiveBreakpointResponse,
};
use http::uri::PathAndQuery;
use tonic::codec::ProstCodec;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Status;

use super::credentials::CredentialSource;
use super::ControllerApi;

/// Deadline for the long-poll list call. The service answers within this
/// window even when nothing changed.
pub const LIST_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for register and update calls.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(20);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const REGISTER_DEBUGGEE: &str = "/google.devtools.clouddebugger.v2.Controller2/RegisterDebuggee";
const LIST_ACTIVE_BREAKPOINTS: &str =
    "/google.devtools.clouddebugger.v2.Controller2/ListActiveBreakpoints";
const UPDATE_ACTIVE_BREAKPOINT: &str =
    "/google.devtools.clouddebugger.v2.Controller2/UpdateActiveBreakpoint";

/// Controller API over a tonic channel.
pub struct GrpcController {
    inner: tonic::client::Grpc<Channel>,
    credentials: CredentialSource,
}

impl GrpcController {
    pub fn new(channel: Channel, credentials: CredentialSource) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
            credentials,
        }
    }

    /// Build a client for `endpoint` without connecting yet. `https`
    /// endpoints get TLS with the system trust roots.
    ///
    /// Must be called inside a tokio runtime.
    pub fn connect_lazy(endpoint: &str, credentials: CredentialSource) -> Result<Self> {
        let mut builder = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| {
                DebugletError::ConfigError(format!("Invalid service endpoint '{}': {}", endpoint, e))
            })?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(Some(Duration::from_secs(60)));

        if builder.uri().scheme_str() == Some("https") {
            builder = builder.tls_config(ClientTlsConfig::new()).map_err(|e| {
                DebugletError::ConfigError(format!("TLS setup for '{}' failed: {}", endpoint, e))
            })?;
        }

        tracing::debug!(endpoint, "Control-plane channel configured");
        Ok(Self::new(builder.connect_lazy(), credentials))
    }

    async fn unary<Req, Resp>(
        &self,
        message: Req,
        method: &'static str,
        timeout: Duration,
    ) -> Result<Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut request = tonic::Request::new(message);
        request.set_timeout(timeout);

        let token = self.credentials.token().await.map_err(|e| {
            DebugletError::Rpc(Status::unavailable(format!("No credentials: {}", e)))
        })?;
        if let Some(token) = token {
            let value: MetadataValue<Ascii> = format!("Bearer {}", token).parse().map_err(|_| {
                DebugletError::AuthError("access token is not a valid header value".to_string())
            })?;
            request.metadata_mut().insert("authorization", value);
        }

        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("Service was not ready: {}", e)))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let call = grpc.unary(request, PathAndQuery::from_static(method), codec);
        let response = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| {
                Status::deadline_exceeded(format!("{} timed out after {:?}", method, timeout))
            })??;

        Ok(response.into_inner())
    }
}

#[async_trait]
impl ControllerApi for GrpcController {
    async fn register_debuggee(
        &self,
        request: RegisterDebuggeeRequest,
    ) -> Result<RegisterDebuggeeResponse> {
        self.unary(request, REGISTER_DEBUGGEE, RPC_TIMEOUT).await
    }

    async fn list_active_breakpoints(
        &self,
        request: ListActiveBreakpointsRequest,
    ) -> Result<ListActiveBreakpointsResponse> {
        self.unary(request, LIST_ACTIVE_BREAKPOINTS, LIST_TIMEOUT)
            .await
    }

    async fn update_active_breakpoint(
        &self,
        request: UpdateActiveBreakpointRequest,
    ) -> Result<UpdateActiveBreakpointResponse> {
        self.unary(request, UPDATE_ACTIVE_BREAKPOINT, RPC_TIMEOUT)
            .await
    }
}
