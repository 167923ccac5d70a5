//! # Notification Dispatcher
//!
//! Delivers multi-channel notifications through configurable provider
//! strategies:
//! - **fallback**: try providers in order until one succeeds
//! - **no-fallback**: exactly one provider, no retry across providers
//! - **roundrobin**: rotate the primary provider on every send
//! - **weighted**: pick providers proportionally to their weight
//!
//! The [`Sender`] fans a request out to every channel it names and reports
//! the per-channel outcome as a [`NotificationStatus`](notification_common::NotificationStatus).

pub mod config;
pub mod registry;
pub mod sender;
pub mod strategy;
pub mod webhook;

#[cfg(test)]
mod test_utilities;

pub use config::{ChannelSettings, DispatcherConfig, ProviderKind, ProviderSettings, WebhookSettings};
pub use registry::{build_provider, build_sender};
pub use sender::{ChannelConfig, SendError, Sender};
pub use strategy::{
    build_strategy, ConfiguredProvider, FallbackStrategy, NoFallbackStrategy, RandomSource,
    RoundRobinStrategy, SeededRandom, Strategy, StrategyKind, StrategySpec, ThreadRandom,
    WeightedStrategy,
};
pub use webhook::WebhookProvider;
