pub mod dns;
pub mod policy;
pub mod smtp;
