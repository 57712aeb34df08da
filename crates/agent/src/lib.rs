// Module structure for the Lens Agent.

// Core infrastructure
pub mod docker;
pub mod client;
pub mod state;
pub mod proto;

// Control channel and sessions
pub mod channel;
pub mod control;
pub mod logs;
pub mod watch;

// Process plumbing
pub mod conf;
pub mod health;
pub mod runtime;
