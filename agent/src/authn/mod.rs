//! Request authentication

pub mod token;
