pub mod audio_source;
pub mod frame_source;
pub mod muxer;
pub mod replay_delegate;
