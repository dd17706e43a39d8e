//! Request and response bodies exchanged with the vote server.

mod requests;
mod responses;

pub use requests::*;
pub use responses::*;
