pub mod binary;
pub mod diagnostic_log;
pub mod filename;
pub mod launcher;
pub mod yt_downloader;
