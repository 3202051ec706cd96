pub mod app;
pub mod controls;
pub mod dialogs;
pub mod video_player;
