pub mod audio_mixer;
pub mod ring_buffer;
pub mod wav_format;
