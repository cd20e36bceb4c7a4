pub mod account;
pub mod analytics;
pub mod asset;
pub mod asset_type;
pub mod bond;
pub mod deposit;
pub mod history;
pub mod holding;
pub mod notification;
pub mod projection;
pub mod quote;
pub mod recurring;
pub mod settings;
pub mod transaction;
pub mod view_asset;
