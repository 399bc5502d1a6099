pub mod drivers;
pub mod health;
pub mod rides;
pub mod stats;
pub mod ws;
