//! Network side of the stagewatch dashboard: the backend's REST surface and
//! the live Socket.IO channel feeding an [`stagewatch_state::EventIngress`].

pub mod backend_client;
pub mod socket_transport;
pub mod watch_runtime;

pub use backend_client::{BackendClient, BackendClientConfig, BackendError, RunAck, RunBackend};
pub use socket_transport::{run_socket_session, socket_endpoint, SessionEnd, SessionOptions};
pub use watch_runtime::{run_watch, spawn_ctrl_c_shutdown, WatchReport, WatchRuntimeConfig};
