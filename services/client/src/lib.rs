pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod remote;
pub mod resource;
pub mod session;
pub mod store;
pub mod wire;

pub use auth::Authenticator;
pub use error::{ClientError, ClientResult};
pub use remote::{RemoteClient, RequestOptions};
pub use resource::ResourceClient;
pub use session::{AuthPhase, Session, SessionState};
pub use store::{CacheState, ConcurrencyPolicy, MutationError, ResourceStore};
