//! Timer domain module
//!
//! Wall-clock and tick scheduling abstractions shared by the session
//! duration clock and the rest countdown.

pub mod clock;
pub mod rest;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rest::{format_rest_duration, RestTimer, RestTimerState, SUPERSET_LABEL};
pub use ticker::{ManualTicker, TickHandle, Ticker, TokioTicker, ONE_SECOND};
