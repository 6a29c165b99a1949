pub mod audio_sample_rewriter;
pub mod frame_drop_policy;
pub mod pcm_gain;
pub mod rewrite_stats;
pub mod sample_retimer;
pub mod trim_window;
pub mod video_sample_rewriter;
