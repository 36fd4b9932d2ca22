pub mod placement;
pub mod question;
pub mod user;
