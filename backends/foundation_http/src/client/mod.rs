// HTTP/1.0 Client Module
//
// One request per client: URL parsing and transport selection in the
// facade, the request pipeline in the connection state machine, and the
// watchdog that bounds every stage of it.

mod client;
mod machine;
mod request;
mod response;
mod signal;
mod watchdog;

pub use client::*;
pub use machine::*;
pub use request::*;
pub use response::*;
pub use signal::*;
pub use watchdog::*;
