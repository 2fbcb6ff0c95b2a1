#![allow(dead_code)]

mod helpers;
mod mock_api;

pub use helpers::*;
pub use mock_api::*;
