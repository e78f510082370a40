pub mod combat;
pub mod constants;
pub mod movement;
pub mod net;
pub mod player;
pub mod sanitize;
pub mod time;
