//! Authentication: session storage, header injection and token refresh

pub mod coordinator;
pub mod jwt;
pub mod middleware;
pub mod refresh;
pub mod session;

pub use coordinator::{GraphQLRefresher, RefreshCoordinator, RefreshLayer, RefreshService, Refresher};
pub use jwt::{decode_unverified, AccessClaims};
pub use middleware::{extract_token, AuthHeader, AuthHeaderLayer};
pub use refresh::{Admission, RefreshQueue, RefreshState, Settlement};
pub use session::{Session, SessionManager};
