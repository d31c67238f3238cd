pub mod interval_frame_scheduler;
pub mod manual_frame_scheduler;
pub mod sampling_worker;
