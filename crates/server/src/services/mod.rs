//! Business logic services.
//!
//! # Services
//!
//! - `qr_exchange` - Trade a QR token for a credential and rotate it
//! - `completion` - Award points on chore completion, once per completion
//! - `chores` - List, create and toggle chores
//! - `provisioning` - Create households and seed members

pub mod chores;
pub mod completion;
pub mod provisioning;
pub mod qr_exchange;

pub use chores::{ChoreService, ChoreView, ToggleResult};
pub use completion::{CompletionReactor, ReactorOutcome};
pub use provisioning::{ProvisionedHousehold, ProvisioningService, SeedRequest, SeedResponse};
pub use qr_exchange::{ExchangeRequest, ExchangeResponse, QrExchangeService};
