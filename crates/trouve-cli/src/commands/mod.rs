pub mod ask;
pub mod auth;
pub mod item;
pub mod photo;
pub mod profile;
pub mod sync;
