pub mod ffmpeg_capture_device;
pub mod still_image_device;
