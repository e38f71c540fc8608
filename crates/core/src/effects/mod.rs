//! Side effects of state transitions
//!
//! Commands plan effects (see [`plan`]) in the same transaction as the
//! transition that triggers them; the [`EffectDispatcher`] applies them
//! after the command's aggregate lock is released.

pub mod dispatcher;
pub mod handler;
mod handlers;
pub mod plan;

pub use dispatcher::EffectDispatcher;
pub use handler::{EffectContext, EffectHandler, EffectHandlerRegistry};
