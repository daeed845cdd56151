//! Core types for Choreboard.
//!
//! This module provides type-safe wrappers for the household domain.

pub mod id;
pub mod model;
pub mod path;
pub mod status;
pub mod token;
pub mod window;

pub use id::*;
pub use model::{Chore, ChoreSnapshot, Household, MAX_CHORE_POINTS, Member, NewChore};
pub use path::{DocumentPath, PathError};
pub use status::*;
pub use token::{QrToken, TokenError};
pub use window::DueWindow;
