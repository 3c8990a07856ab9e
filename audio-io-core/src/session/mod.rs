mod device_ops;
mod dispatcher;
mod input_capturer;
pub mod manager;
mod output_player;
