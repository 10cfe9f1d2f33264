pub mod errors;
pub mod models;
pub mod normalize;
pub mod providers;
pub mod requests;
pub mod time;
