pub mod balance;
pub mod messages;
pub mod row;

pub use balance::{balance_text, format_balance};
pub use messages::{ErrorBody, UsageResponse, PATH_HEADER, RELAY_ROUTE, TOKEN_HEADER, USAGE_PATH};
pub use row::{DateRange, Row, UsageQuery};
