//! Game rules for four-in-a-row.
//!
//! Pure functions over a [`Board`](super::Board). They never keep state
//! between calls, so the bot can evaluate hypothetical boards with them.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::check_win;
