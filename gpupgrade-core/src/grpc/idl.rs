///////////////////////////////////////////////////////////////////////////////
// Components /////////////////////////////////////////////////////////////////

/// A single database instance.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Segment {
    #[prost(int32, tag = "1")]
    pub db_id: i32,
    #[prost(int32, tag = "2")]
    pub content_id: i32,
    #[prost(enumeration = "Role", tag = "3")]
    pub role: i32,
    #[prost(uint32, tag = "4")]
    pub port: u32,
    #[prost(string, tag = "5")]
    pub hostname: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub data_dir: ::prost::alloc::string::String,
}
/// A full cluster generation.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Cluster {
    #[prost(enumeration = "ClusterDestination", tag = "1")]
    pub destination: i32,
    #[prost(string, tag = "2")]
    pub gphome: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub version: ::prost::alloc::string::String,
    /// All segments of the cluster, coordinator first.
    #[prost(message, repeated, tag = "4")]
    pub segments: ::prost::alloc::vec::Vec<Segment>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitializeRequest {
    #[prost(uint32, tag = "1")]
    pub agent_port: u32,
    #[prost(string, tag = "2")]
    pub source_gphome: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub target_gphome: ::prost::alloc::string::String,
    #[prost(uint32, tag = "4")]
    pub source_port: u32,
    #[prost(enumeration = "Mode", tag = "5")]
    pub mode: i32,
    #[prost(bool, tag = "6")]
    pub use_hba_hostnames: bool,
    /// Ports available for the intermediate cluster.
    #[prost(uint32, repeated, tag = "7")]
    pub ports: ::prost::alloc::vec::Vec<u32>,
    /// The segment records of the source cluster.
    #[prost(message, repeated, tag = "8")]
    pub source_segments: ::prost::alloc::vec::Vec<Segment>,
    #[prost(string, tag = "9")]
    pub source_version: ::prost::alloc::string::String,
    #[prost(string, tag = "10")]
    pub target_version: ::prost::alloc::string::String,
    /// The fraction of each data directory's filesystem which must be free, from 0.0 to 1.0.
    #[prost(double, tag = "11")]
    pub disk_free_ratio: f64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitializeResponse {
    #[prost(message, optional, tag = "1")]
    pub source: ::core::option::Option<Cluster>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitializeCreateClusterRequest {
    #[prost(string, tag = "1")]
    pub dynamic_library_path: ::prost::alloc::string::String,
    /// Run pg_upgrade with --verbose, for this check and for execute.
    #[prost(bool, tag = "2")]
    pub pg_upgrade_verbose: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitializeCreateClusterResponse {
    #[prost(message, optional, tag = "1")]
    pub intermediate: ::core::option::Option<Cluster>,
    #[prost(bool, tag = "2")]
    pub has_all_mirrors_and_standby: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteRequest {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecuteResponse {
    #[prost(message, optional, tag = "1")]
    pub intermediate: ::core::option::Option<Cluster>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FinalizeRequest {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FinalizeResponse {
    #[prost(message, optional, tag = "1")]
    pub target: ::core::option::Option<Cluster>,
    #[prost(string, tag = "2")]
    pub log_archive_directory: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RevertRequest {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RevertResponse {
    #[prost(message, optional, tag = "1")]
    pub source: ::core::option::Option<Cluster>,
    #[prost(string, tag = "2")]
    pub source_version: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub log_archive_directory: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopServicesRequest {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopServicesReply {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestartAgentsRequest {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RestartAgentsReply {
    #[prost(string, repeated, tag = "1")]
    pub agent_hosts: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopAgentRequest {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopAgentReply {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckEnvironmentRequest {
    #[prost(string, repeated, tag = "1")]
    pub data_dirs: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    /// The fraction of each data directory's filesystem which must be free. Zero disables the check.
    #[prost(double, tag = "2")]
    pub disk_free_ratio: f64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckEnvironmentReply {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateDataDirectoriesRequest {
    #[prost(string, repeated, tag = "1")]
    pub data_dirs: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateDataDirectoriesReply {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SegmentPair {
    #[prost(message, optional, tag = "1")]
    pub source: ::core::option::Option<Segment>,
    #[prost(message, optional, tag = "2")]
    pub target: ::core::option::Option<Segment>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpgradePrimariesRequest {
    #[prost(enumeration = "Mode", tag = "1")]
    pub mode: i32,
    #[prost(string, tag = "2")]
    pub source_gphome: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub target_gphome: ::prost::alloc::string::String,
    #[prost(bool, tag = "4")]
    pub check_only: bool,
    #[prost(message, repeated, tag = "5")]
    pub pairs: ::prost::alloc::vec::Vec<SegmentPair>,
    #[prost(bool, tag = "6")]
    pub verbose: bool,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpgradePrimariesReply {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectoryPair {
    #[prost(string, tag = "1")]
    pub source: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub target: ::prost::alloc::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RenameDirectoriesRequest {
    #[prost(message, repeated, tag = "1")]
    pub pairs: ::prost::alloc::vec::Vec<DirectoryPair>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RenameDirectoriesReply {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteDirectoriesRequest {
    #[prost(string, repeated, tag = "1")]
    pub dirs: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteDirectoriesReply {}
/// The upgrade mode, controlling whether data files are copied or hard-linked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Mode {
    UnknownMode = 0,
    Copy = 1,
    Link = 2,
}
/// The role of a segment within its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Role {
    UnknownRole = 0,
    Primary = 1,
    Mirror = 2,
}
/// The generation which a cluster represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ClusterDestination {
    UnknownDestination = 0,
    Source = 1,
    Intermediate = 2,
    Target = 3,
}
#[doc = r" Generated client implementations."]
pub mod cli_to_hub_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    #[doc = " The interface exposed by the hub to the CLI."]
    #[derive(Debug, Clone)]
    pub struct CliToHubClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl CliToHubClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> CliToHubClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + Send + Sync + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor<F>(inner: T, interceptor: F) -> CliToHubClient<InterceptedService<T, F>>
        where
            F: tonic::service::Interceptor,
            T: tonic::codegen::Service<http::Request<tonic::body::BoxBody>, Response = http::Response<<T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody>>,
            <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error: Into<StdError> + Send + Sync,
        {
            CliToHubClient::new(InterceptedService::new(inner, interceptor))
        }
        #[doc = r" Compress requests with `gzip`."]
        #[doc = r""]
        #[doc = r" This requires the server to support it otherwise it might respond with an"]
        #[doc = r" error."]
        pub fn send_gzip(mut self) -> Self {
            self.inner = self.inner.send_gzip();
            self
        }
        #[doc = r" Enable decompressing responses with `gzip`."]
        pub fn accept_gzip(mut self) -> Self {
            self.inner = self.inner.accept_gzip();
            self
        }
        pub async fn initialize(&mut self, request: impl tonic::IntoRequest<super::InitializeRequest>) -> Result<tonic::Response<super::InitializeResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/Initialize");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn initialize_create_cluster(&mut self, request: impl tonic::IntoRequest<super::InitializeCreateClusterRequest>) -> Result<tonic::Response<super::InitializeCreateClusterResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/InitializeCreateCluster");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn execute(&mut self, request: impl tonic::IntoRequest<super::ExecuteRequest>) -> Result<tonic::Response<super::ExecuteResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/Execute");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn finalize(&mut self, request: impl tonic::IntoRequest<super::FinalizeRequest>) -> Result<tonic::Response<super::FinalizeResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/Finalize");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn revert(&mut self, request: impl tonic::IntoRequest<super::RevertRequest>) -> Result<tonic::Response<super::RevertResponse>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/Revert");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn stop_services(&mut self, request: impl tonic::IntoRequest<super::StopServicesRequest>) -> Result<tonic::Response<super::StopServicesReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/StopServices");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn restart_agents(&mut self, request: impl tonic::IntoRequest<super::RestartAgentsRequest>) -> Result<tonic::Response<super::RestartAgentsReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.CliToHub/RestartAgents");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
}
#[doc = r" Generated client implementations."]
pub mod agent_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    #[doc = " The interface exposed by each agent to the hub."]
    #[derive(Debug, Clone)]
    pub struct AgentClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl AgentClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> AgentClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + Send + Sync + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor<F>(inner: T, interceptor: F) -> AgentClient<InterceptedService<T, F>>
        where
            F: tonic::service::Interceptor,
            T: tonic::codegen::Service<http::Request<tonic::body::BoxBody>, Response = http::Response<<T as tonic::client::GrpcService<tonic::body::BoxBody>>::ResponseBody>>,
            <T as tonic::codegen::Service<http::Request<tonic::body::BoxBody>>>::Error: Into<StdError> + Send + Sync,
        {
            AgentClient::new(InterceptedService::new(inner, interceptor))
        }
        #[doc = r" Compress requests with `gzip`."]
        #[doc = r""]
        #[doc = r" This requires the server to support it otherwise it might respond with an"]
        #[doc = r" error."]
        pub fn send_gzip(mut self) -> Self {
            self.inner = self.inner.send_gzip();
            self
        }
        #[doc = r" Enable decompressing responses with `gzip`."]
        pub fn accept_gzip(mut self) -> Self {
            self.inner = self.inner.accept_gzip();
            self
        }
        #[doc = " Terminate the agent. The agent exits before replying."]
        pub async fn stop_agent(&mut self, request: impl tonic::IntoRequest<super::StopAgentRequest>) -> Result<tonic::Response<super::StopAgentReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.Agent/StopAgent");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn check_environment(&mut self, request: impl tonic::IntoRequest<super::CheckEnvironmentRequest>) -> Result<tonic::Response<super::CheckEnvironmentReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.Agent/CheckEnvironment");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn create_data_directories(&mut self, request: impl tonic::IntoRequest<super::CreateDataDirectoriesRequest>) -> Result<tonic::Response<super::CreateDataDirectoriesReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.Agent/CreateDataDirectories");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn upgrade_primaries(&mut self, request: impl tonic::IntoRequest<super::UpgradePrimariesRequest>) -> Result<tonic::Response<super::UpgradePrimariesReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.Agent/UpgradePrimaries");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn rename_directories(&mut self, request: impl tonic::IntoRequest<super::RenameDirectoriesRequest>) -> Result<tonic::Response<super::RenameDirectoriesReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.Agent/RenameDirectories");
            self.inner.unary(request.into_request(), path, codec).await
        }
        pub async fn delete_directories(&mut self, request: impl tonic::IntoRequest<super::DeleteDirectoriesRequest>) -> Result<tonic::Response<super::DeleteDirectoriesReply>, tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e.into())))?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/idl.Agent/DeleteDirectories");
            self.inner.unary(request.into_request(), path, codec).await
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod cli_to_hub_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with CliToHubServer."]
    #[async_trait]
    pub trait CliToHub: Send + Sync + 'static {
        async fn initialize(&self, request: tonic::Request<super::InitializeRequest>) -> Result<tonic::Response<super::InitializeResponse>, tonic::Status>;
        async fn initialize_create_cluster(&self, request: tonic::Request<super::InitializeCreateClusterRequest>) -> Result<tonic::Response<super::InitializeCreateClusterResponse>, tonic::Status>;
        async fn execute(&self, request: tonic::Request<super::ExecuteRequest>) -> Result<tonic::Response<super::ExecuteResponse>, tonic::Status>;
        async fn finalize(&self, request: tonic::Request<super::FinalizeRequest>) -> Result<tonic::Response<super::FinalizeResponse>, tonic::Status>;
        async fn revert(&self, request: tonic::Request<super::RevertRequest>) -> Result<tonic::Response<super::RevertResponse>, tonic::Status>;
        async fn stop_services(&self, request: tonic::Request<super::StopServicesRequest>) -> Result<tonic::Response<super::StopServicesReply>, tonic::Status>;
        async fn restart_agents(&self, request: tonic::Request<super::RestartAgentsRequest>) -> Result<tonic::Response<super::RestartAgentsReply>, tonic::Status>;
    }
    #[doc = " The interface exposed by the hub to the CLI."]
    #[derive(Debug)]
    pub struct CliToHubServer<T: CliToHub> {
        inner: _Inner<T>,
        accept_compression_encodings: (),
        send_compression_encodings: (),
    }
    struct _Inner<T>(Arc<T>);
    impl<T: CliToHub> CliToHubServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner);
            Self {
                inner,
                accept_compression_encodings: Default::default(),
                send_compression_encodings: Default::default(),
            }
        }
        pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
        where
            F: tonic::service::Interceptor,
        {
            InterceptedService::new(Self::new(inner), interceptor)
        }
    }
    impl<T, B> tonic::codegen::Service<http::Request<B>> for CliToHubServer<T>
    where
        T: CliToHub,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/idl.CliToHub/Initialize" => {
                    #[allow(non_camel_case_types)]
                    struct InitializeSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::InitializeRequest> for InitializeSvc<T> {
                        type Response = super::InitializeResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::InitializeRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).initialize(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = InitializeSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.CliToHub/InitializeCreateCluster" => {
                    #[allow(non_camel_case_types)]
                    struct InitializeCreateClusterSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::InitializeCreateClusterRequest> for InitializeCreateClusterSvc<T> {
                        type Response = super::InitializeCreateClusterResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::InitializeCreateClusterRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).initialize_create_cluster(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = InitializeCreateClusterSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.CliToHub/Execute" => {
                    #[allow(non_camel_case_types)]
                    struct ExecuteSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::ExecuteRequest> for ExecuteSvc<T> {
                        type Response = super::ExecuteResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::ExecuteRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).execute(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = ExecuteSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.CliToHub/Finalize" => {
                    #[allow(non_camel_case_types)]
                    struct FinalizeSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::FinalizeRequest> for FinalizeSvc<T> {
                        type Response = super::FinalizeResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::FinalizeRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).finalize(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = FinalizeSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.CliToHub/Revert" => {
                    #[allow(non_camel_case_types)]
                    struct RevertSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::RevertRequest> for RevertSvc<T> {
                        type Response = super::RevertResponse;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::RevertRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).revert(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = RevertSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.CliToHub/StopServices" => {
                    #[allow(non_camel_case_types)]
                    struct StopServicesSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::StopServicesRequest> for StopServicesSvc<T> {
                        type Response = super::StopServicesReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::StopServicesRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).stop_services(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = StopServicesSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.CliToHub/RestartAgents" => {
                    #[allow(non_camel_case_types)]
                    struct RestartAgentsSvc<T: CliToHub>(pub Arc<T>);
                    impl<T: CliToHub> tonic::server::UnaryService<super::RestartAgentsRequest> for RestartAgentsSvc<T> {
                        type Response = super::RestartAgentsReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::RestartAgentsRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).restart_agents(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = RestartAgentsSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: CliToHub> Clone for CliToHubServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self {
                inner,
                accept_compression_encodings: self.accept_compression_encodings,
                send_compression_encodings: self.send_compression_encodings,
            }
        }
    }
    impl<T: CliToHub> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: CliToHub> tonic::transport::NamedService for CliToHubServer<T> {
        const NAME: &'static str = "idl.CliToHub";
    }
}
#[doc = r" Generated server implementations."]
pub mod agent_server {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with AgentServer."]
    #[async_trait]
    pub trait Agent: Send + Sync + 'static {
        #[doc = " Terminate the agent. The agent exits before replying."]
        async fn stop_agent(&self, request: tonic::Request<super::StopAgentRequest>) -> Result<tonic::Response<super::StopAgentReply>, tonic::Status>;
        async fn check_environment(&self, request: tonic::Request<super::CheckEnvironmentRequest>) -> Result<tonic::Response<super::CheckEnvironmentReply>, tonic::Status>;
        async fn create_data_directories(&self, request: tonic::Request<super::CreateDataDirectoriesRequest>) -> Result<tonic::Response<super::CreateDataDirectoriesReply>, tonic::Status>;
        async fn upgrade_primaries(&self, request: tonic::Request<super::UpgradePrimariesRequest>) -> Result<tonic::Response<super::UpgradePrimariesReply>, tonic::Status>;
        async fn rename_directories(&self, request: tonic::Request<super::RenameDirectoriesRequest>) -> Result<tonic::Response<super::RenameDirectoriesReply>, tonic::Status>;
        async fn delete_directories(&self, request: tonic::Request<super::DeleteDirectoriesRequest>) -> Result<tonic::Response<super::DeleteDirectoriesReply>, tonic::Status>;
    }
    #[doc = " The interface exposed by each agent to the hub."]
    #[derive(Debug)]
    pub struct AgentServer<T: Agent> {
        inner: _Inner<T>,
        accept_compression_encodings: (),
        send_compression_encodings: (),
    }
    struct _Inner<T>(Arc<T>);
    impl<T: Agent> AgentServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner);
            Self {
                inner,
                accept_compression_encodings: Default::default(),
                send_compression_encodings: Default::default(),
            }
        }
        pub fn with_interceptor<F>(inner: T, interceptor: F) -> InterceptedService<Self, F>
        where
            F: tonic::service::Interceptor,
        {
            InterceptedService::new(Self::new(inner), interceptor)
        }
    }
    impl<T, B> tonic::codegen::Service<http::Request<B>> for AgentServer<T>
    where
        T: Agent,
        B: Body + Send + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/idl.Agent/StopAgent" => {
                    #[allow(non_camel_case_types)]
                    struct StopAgentSvc<T: Agent>(pub Arc<T>);
                    impl<T: Agent> tonic::server::UnaryService<super::StopAgentRequest> for StopAgentSvc<T> {
                        type Response = super::StopAgentReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::StopAgentRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).stop_agent(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = StopAgentSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.Agent/CheckEnvironment" => {
                    #[allow(non_camel_case_types)]
                    struct CheckEnvironmentSvc<T: Agent>(pub Arc<T>);
                    impl<T: Agent> tonic::server::UnaryService<super::CheckEnvironmentRequest> for CheckEnvironmentSvc<T> {
                        type Response = super::CheckEnvironmentReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::CheckEnvironmentRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).check_environment(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = CheckEnvironmentSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.Agent/CreateDataDirectories" => {
                    #[allow(non_camel_case_types)]
                    struct CreateDataDirectoriesSvc<T: Agent>(pub Arc<T>);
                    impl<T: Agent> tonic::server::UnaryService<super::CreateDataDirectoriesRequest> for CreateDataDirectoriesSvc<T> {
                        type Response = super::CreateDataDirectoriesReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::CreateDataDirectoriesRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).create_data_directories(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = CreateDataDirectoriesSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.Agent/UpgradePrimaries" => {
                    #[allow(non_camel_case_types)]
                    struct UpgradePrimariesSvc<T: Agent>(pub Arc<T>);
                    impl<T: Agent> tonic::server::UnaryService<super::UpgradePrimariesRequest> for UpgradePrimariesSvc<T> {
                        type Response = super::UpgradePrimariesReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::UpgradePrimariesRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).upgrade_primaries(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = UpgradePrimariesSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.Agent/RenameDirectories" => {
                    #[allow(non_camel_case_types)]
                    struct RenameDirectoriesSvc<T: Agent>(pub Arc<T>);
                    impl<T: Agent> tonic::server::UnaryService<super::RenameDirectoriesRequest> for RenameDirectoriesSvc<T> {
                        type Response = super::RenameDirectoriesReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::RenameDirectoriesRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).rename_directories(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = RenameDirectoriesSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/idl.Agent/DeleteDirectories" => {
                    #[allow(non_camel_case_types)]
                    struct DeleteDirectoriesSvc<T: Agent>(pub Arc<T>);
                    impl<T: Agent> tonic::server::UnaryService<super::DeleteDirectoriesRequest> for DeleteDirectoriesSvc<T> {
                        type Response = super::DeleteDirectoriesReply;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(&mut self, request: tonic::Request<super::DeleteDirectoriesRequest>) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).delete_directories(request).await };
                            Box::pin(fut)
                        }
                    }
                    let accept_compression_encodings = self.accept_compression_encodings;
                    let send_compression_encodings = self.send_compression_encodings;
                    let inner = self.inner.clone();
                    let fut = async move {
                        let inner = inner.0;
                        let method = DeleteDirectoriesSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = tonic::server::Grpc::new(codec).apply_compression_config(accept_compression_encodings, send_compression_encodings);
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(empty_body())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: Agent> Clone for AgentServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self {
                inner,
                accept_compression_encodings: self.accept_compression_encodings,
                send_compression_encodings: self.send_compression_encodings,
            }
        }
    }
    impl<T: Agent> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: Agent> tonic::transport::NamedService for AgentServer<T> {
        const NAME: &'static str = "idl.Agent";
    }
}
