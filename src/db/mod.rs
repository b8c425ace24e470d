pub mod accounts;
pub mod audit;
pub mod password_resets;
