pub mod analysis;
pub mod response;
