use std::path::{Path, PathBuf};

use crate::media::domain::media_device::{MediaAccessError, MediaConstraints, MediaDevice};
use crate::shared::frame::Frame;
use crate::shared::stream_info::StreamInfo;

/// Where an [`FfmpegCaptureDevice`] reads from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureLocator {
    /// A capture device through an ffmpeg input format (`v4l2`, `avfoundation`, `dshow`).
    Device { input_format: String, name: String },
    /// A recorded file, decoded as if it were a camera.
    File(PathBuf),
}

impl CaptureLocator {
    /// The platform camera with the platform's default input format.
    pub fn default_camera() -> Self {
        CaptureLocator::Device {
            input_format: default_input_format().to_string(),
            name: default_device_name().to_string(),
        }
    }

    fn describe(&self) -> String {
        match self {
            CaptureLocator::Device { input_format, name } => format!("{input_format}:{name}"),
            CaptureLocator::File(path) => path.display().to_string(),
        }
    }
}

pub fn default_input_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

fn default_device_name() -> &'static str {
    if cfg!(target_os = "macos") {
        "0"
    } else if cfg!(target_os = "windows") {
        "video=Integrated Camera"
    } else {
        "/dev/video0"
    }
}

/// Camera (or file) capture via ffmpeg-next.
///
/// Each `read_frame` decodes the next picture and converts it to RGB24.
/// Once a file runs out the device reports itself closed.
pub struct FfmpegCaptureDevice {
    locator: CaptureLocator,
    session: Option<CaptureSession>,
}

struct CaptureSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    sequence: u64,
    flushing: bool,
    finished: bool,
}

// Safety: the device is only driven from the sampling thread. The raw
// pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegCaptureDevice {}

impl FfmpegCaptureDevice {
    pub fn new(locator: CaptureLocator) -> Self {
        Self {
            locator,
            session: None,
        }
    }

    fn start(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<(CaptureSession, StreamInfo), MediaAccessError> {
        ffmpeg_next::init().map_err(|e| MediaAccessError::Backend(e.to_string()))?;
        let ictx = open_input(&self.locator, constraints)
            .map_err(|e| map_open_error(&self.locator, e))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| {
                MediaAccessError::DeviceUnavailable(format!(
                    "{}: no video stream",
                    self.locator.describe()
                ))
            })?;
        let stream_index = stream.index();
        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let backend = |e: ffmpeg_next::Error| MediaAccessError::Backend(e.to_string());
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(backend)?;
        let decoder = codec_ctx.decoder().video().map_err(backend)?;
        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(backend)?;
        let has_audio = constraints.audio
            && ictx.streams().best(ffmpeg_next::media::Type::Audio).is_some();

        let info = StreamInfo {
            width,
            height,
            fps,
            source: match &self.locator {
                CaptureLocator::Device { name, .. } => Some(PathBuf::from(name)),
                CaptureLocator::File(path) => Some(path.clone()),
            },
            has_audio,
        };
        let session = CaptureSession {
            ictx,
            decoder,
            scaler,
            width,
            height,
            stream_index,
            sequence: 0,
            flushing: false,
            finished: false,
        };
        Ok((session, info))
    }
}

impl MediaDevice for FfmpegCaptureDevice {
    fn open(&mut self, constraints: &MediaConstraints) -> Result<StreamInfo, MediaAccessError> {
        if !constraints.video {
            return Err(MediaAccessError::Backend(
                "video capture is required for emotion sampling".to_string(),
            ));
        }
        self.release();
        let (session, info) = self.start(constraints)?;
        log::info!("Opened capture source {}", self.locator.describe());
        self.session = Some(session);
        Ok(info)
    }

    fn read_frame(&mut self) -> Option<Frame> {
        let session = self.session.as_mut()?;
        match session.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Capture decode error: {e}");
                None
            }
        }
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            log::info!("Released capture source {}", self.locator.describe());
        }
    }

    fn is_open(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.finished)
    }
}

impl Drop for FfmpegCaptureDevice {
    fn drop(&mut self) {
        self.release();
    }
}

impl CaptureSession {
    /// Decodes forward until one picture is out, or the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, ffmpeg_next::Error> {
        if self.finished {
            return Ok(None);
        }
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
            if self.flushing {
                self.finished = true;
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.stream_index {
                        // Corrupt packets are dropped; the next one may decode.
                        let _ = self.decoder.send_packet(&packet);
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb)?;

        let pixels = packed_rgb(&rgb, self.width, self.height);
        self.sequence += 1;
        Ok(Some(Frame::new(pixels, self.width, self.height, 3, self.sequence)))
    }
}

fn open_input(
    locator: &CaptureLocator,
    constraints: &MediaConstraints,
) -> Result<ffmpeg_next::format::context::Input, ffmpeg_next::Error> {
    match locator {
        CaptureLocator::File(path) => ffmpeg_next::format::input(path),
        CaptureLocator::Device { input_format, name } => {
            ffmpeg_next::device::register_all();
            let format = ffmpeg_next::device::input::video()
                .find(|f| f.name() == input_format.as_str())
                .ok_or(ffmpeg_next::Error::DemuxerNotFound)?;

            let mut options = ffmpeg_next::Dictionary::new();
            if let (Some(w), Some(h)) = (constraints.width, constraints.height) {
                options.set("video_size", &format!("{w}x{h}"));
            }
            let ctx = ffmpeg_next::format::open_with(
                Path::new(name),
                &ffmpeg_next::format::Format::Input(format),
                options,
            )?;
            match ctx {
                ffmpeg_next::format::context::Context::Input(input) => Ok(input),
                ffmpeg_next::format::context::Context::Output(_) => {
                    Err(ffmpeg_next::Error::DemuxerNotFound)
                }
            }
        }
    }
}

fn map_open_error(locator: &CaptureLocator, error: ffmpeg_next::Error) -> MediaAccessError {
    let what = locator.describe();
    match error {
        ffmpeg_next::Error::Other { errno } => {
            match std::io::Error::from_raw_os_error(errno).kind() {
                std::io::ErrorKind::PermissionDenied => MediaAccessError::PermissionDenied(what),
                std::io::ErrorKind::NotFound => MediaAccessError::DeviceUnavailable(what),
                _ => MediaAccessError::Backend(format!("{what}: {error}")),
            }
        }
        ffmpeg_next::Error::DemuxerNotFound | ffmpeg_next::Error::StreamNotFound => {
            MediaAccessError::DeviceUnavailable(what)
        }
        other => MediaAccessError::Backend(format!("{what}: {other}")),
    }
}

/// Strips ffmpeg's per-row padding (stride > width * 3).
fn packed_rgb(rgb: &ffmpeg_next::util::frame::video::Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;
    (0..height as usize)
        .flat_map(|row| &data[row * stride..row * stride + row_bytes])
        .copied()
        .collect()
}
