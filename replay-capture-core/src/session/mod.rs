pub mod controller;
pub(crate) mod feed;
pub(crate) mod save_gate;
pub(crate) mod save_session;
pub mod trigger;
