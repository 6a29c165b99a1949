pub mod export_job;
pub mod export_logger;
pub mod export_video_use_case;
pub mod infrastructure;
pub mod progress_tracker;
