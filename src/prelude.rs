//! Convenience re-exports for hosts embedding the front. Pull this module in
//! via `use blockfront::prelude::*;`.

pub use crate::config::FrontConfig;
pub use crate::front::event::{Completion, FrontAction, FrontEvent};
pub use crate::front::membership::{Membership, MembershipView, NodeIdentity};
pub use crate::front::reply::{Reply, ReplyStatus};
pub use crate::front::request::{MsgQos, Request, RequestClass, SenderId};
pub use crate::front::AdmissionFront;
pub use crate::lifecycle::{LifecycleState, RecoveryReport};
pub use crate::util::error::{FrontError, FrontResult};
