pub mod claims;
pub mod items;
pub mod reviews;
pub mod users;
pub mod workshops;
