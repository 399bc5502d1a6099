//! Client-side flow: the transport layer and the rider/driver controllers
//! that own their state machines.

pub mod driver_flow;
pub mod ride_flow;
pub mod transport;

pub use driver_flow::DriverFlowController;
pub use ride_flow::RideFlowController;
pub use transport::{
    CancelOutcome, HttpBackend, ReqwestBackend, RetryPolicy, TransportClient, TransportError,
};
