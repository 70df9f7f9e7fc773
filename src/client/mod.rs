//! Client side of the stage API
//!
//! - [`StageBackend`] - transport-neutral operations, implemented in-process by
//!   [`StageApi`](crate::core::api::StageApi) and remotely by [`HttpStageClient`]
//! - [`SessionProvider`] - where bearer tokens come from
//! - [`ReconciliationStore`] - a session's cached view of stage collections

pub mod backend;
pub mod http;
pub mod reconcile;
pub mod session;

pub use backend::StageBackend;
pub use http::HttpStageClient;
pub use reconcile::ReconciliationStore;
pub use session::{BearerToken, SessionProvider, StaticSession};
