//! 抽取网关
//!
//! 位于批次客户端与上游抽取服务之间的 HTTP 服务，
//! 以及客户端和网关共用的响应规范化逻辑。

pub mod normalize;
pub mod server;

pub use normalize::{normalize_response, status_for, transport_failure};
pub use server::{router, serve, serve_on, GatewayState};
