pub mod binding;
pub mod cookie;
pub mod factory;
pub mod gatekeeper;
pub mod session_jwt;
pub mod token;
pub mod upstream;

pub use factory::build_gatekeeper;
pub use gatekeeper::{Forward, Gatekeeper, ProjectBinding, RejectReason, RequestIdentityContext};
