pub mod dashboard;

pub use dashboard::{app, DashboardQuery, QuoteQuery};
