mod client;
mod errors;
mod search;
mod session;
pub mod types;
pub mod user_agent;
pub use self::client::Client;
pub use self::errors::Error;
pub use self::search::{search_all_reports, ReportPageSource, ReportSearchQuery};
pub use self::session::Session;
