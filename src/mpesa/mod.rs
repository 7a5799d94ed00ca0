pub mod callback;
pub mod client;

pub use client::{DarajaClient, MpesaError, StkPushAcceptance};
