pub mod bond_pricing;
pub mod capital_gains_service;
pub mod history_service;
pub mod irr_service;
pub mod notification_service;
pub mod periodic_checks;
pub mod projection_service;
pub mod quote_service;
pub mod scheduler;
pub mod transaction_service;
pub mod valuation_service;
pub mod view_asset_service;
