pub mod measurement;
pub mod page;
pub mod parameter;
pub mod provider;
pub mod station;
pub mod weather;
