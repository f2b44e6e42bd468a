//! Camera fallback for machines without an ambient light sensor.
//!
//! Each reading grabs one frame and uses its mean luma as the light level.
//! Capture goes through V4L2 and is only compiled in with the `camera` feature.

use crate::errors::*;
use crate::sensor::LightLevel;

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;

#[cfg(feature = "camera")]
use crate::consts::CAMERA_INDEX;
#[cfg(any(feature = "camera", test))]
use std::time::Duration;
#[cfg(feature = "camera")]
use v4l::{
    Device, FourCC,
    buffer::Type,
    io::{mmap::Stream, traits::CaptureStream},
    video::Capture as _,
};

make_log_macro!(debug, "camera");
make_log_macro!(info, "camera");
make_log_macro!(warn, "camera");

/// How the intensity of each pixel is laid out in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// One 8 bit luma sample per pixel
    Grey,
    /// Packed 4:2:2, luma in every even byte
    Yuyv,
}

/// Mean intensity of a frame, mapped linearly onto 0..=100.
pub fn frame_light_level(frame: &[u8], layout: PixelLayout) -> Option<LightLevel> {
    let step = match layout {
        PixelLayout::Grey => 1,
        PixelLayout::Yuyv => 2,
    };
    let (sum, count) = frame
        .iter()
        .step_by(step)
        .fold((0u64, 0u64), |(sum, count), &luma| (sum + luma as u64, count + 1));

    if count == 0 {
        return None;
    }
    Some(sum as f64 / count as f64 / 255.0 * 100.0)
}

/// Reading the camera blocks, so the device lives on its own thread and
/// readings are requested over a channel. The caller can then give up on a
/// slow frame without stalling the runtime.
pub struct CameraLightSensor {
    worker: Option<CaptureWorker>,
}

type Reply = oneshot::Sender<Result<Option<LightLevel>>>;

struct CaptureWorker {
    requests: mpsc::Sender<Reply>,
    thread: JoinHandle<()>,
}

impl CaptureWorker {
    /// Run `open` on a new thread and serve readings from what it returns.
    fn spawn<F, S>(open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
        S: FnMut() -> Result<Option<LightLevel>>,
    {
        let (requests, pending) = mpsc::channel::<Reply>();
        let (opened_tx, opened) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("camera".into())
            .spawn(move || {
                let mut read_frame = match open() {
                    Ok(read_frame) => {
                        let _ = opened_tx.send(Ok(()));
                        read_frame
                    }
                    Err(e) => {
                        let _ = opened_tx.send(Err(e));
                        return;
                    }
                };
                // ends once the sensor drops its sender
                while let Ok(reply) = pending.recv() {
                    let _ = reply.send(read_frame());
                }
            })?;

        match opened.recv() {
            Ok(Ok(())) => Ok(Self { requests, thread }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AmbrightError::Other("camera thread died while opening".into()))
            }
        }
    }

    async fn read(&self) -> Result<Option<LightLevel>> {
        let (reply, level) = oneshot::channel();
        self.requests
            .send(reply)
            .error("camera thread is gone")?;
        level.await.error("camera thread is gone")?
    }

    fn stop(self) {
        drop(self.requests);
        if self.thread.join().is_err() {
            warn!("camera thread panicked");
        }
    }
}

impl CameraLightSensor {
    /// Open the default capture device. `None` if it can't be opened.
    pub fn discover() -> Option<Self> {
        let worker = CaptureWorker::spawn(|| {
            let mut capture = Capture::open()?;
            Ok(move || capture.frame_light_level())
        });

        match worker {
            Ok(worker) => {
                info!("camera sensor initialized");
                Some(Self {
                    worker: Some(worker),
                })
            }
            Err(e) => {
                warn!("could not open camera: {e}");
                None
            }
        }
    }

    /// A failed capture is not an error, the camera may just be busy.
    pub async fn read_light_level(&mut self) -> Option<LightLevel> {
        let worker = self.worker.as_ref()?;
        match worker.read().await {
            Ok(level) => level,
            Err(e) => {
                warn!("error reading camera: {e}");
                None
            }
        }
    }

    /// Close the capture device. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            info!("camera released");
        }
    }
}

impl Drop for CameraLightSensor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(feature = "camera")]
struct Capture {
    // declared before `_device` so the buffers are unmapped first
    stream: Stream<'static>,
    layout: PixelLayout,
    _device: Device,
}

#[cfg(feature = "camera")]
impl Capture {
    fn open() -> Result<Self> {
        let device = Device::new(CAMERA_INDEX)?;

        let mut format = device.format()?;
        format.fourcc = FourCC::new(b"YUYV");
        let format = device.set_format(&format)?;
        let layout = if format.fourcc == FourCC::new(b"YUYV") {
            PixelLayout::Yuyv
        } else if format.fourcc == FourCC::new(b"GREY") {
            PixelLayout::Grey
        } else {
            return Err(AmbrightError::Other(format!(
                "camera only offers {} frames",
                format.fourcc
            )));
        };
        debug!("capturing {}x{} {}", format.width, format.height, format.fourcc);

        let mut stream = Stream::with_buffers(&device, Type::VideoCapture, 2)?;
        stream.set_timeout(Duration::from_secs(1));

        Ok(Self {
            stream,
            layout,
            _device: device,
        })
    }

    fn frame_light_level(&mut self) -> Result<Option<LightLevel>> {
        let (buffer, meta) = self.stream.next()?;
        let used = (meta.bytesused as usize).min(buffer.len());
        Ok(frame_light_level(&buffer[..used], self.layout))
    }
}

#[cfg(not(feature = "camera"))]
enum Capture {}

#[cfg(not(feature = "camera"))]
impl Capture {
    fn open() -> Result<Self> {
        debug!("built without the camera feature");
        Err(AmbrightError::Other("camera support not compiled in".into()))
    }

    fn frame_light_level(&mut self) -> Result<Option<LightLevel>> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grey_frame_mean() {
        assert_eq!(frame_light_level(&[0, 0, 0, 0], PixelLayout::Grey), Some(0.0));
        assert_eq!(frame_light_level(&[255; 16], PixelLayout::Grey), Some(100.0));

        let level = frame_light_level(&[0, 255, 51, 204], PixelLayout::Grey).unwrap();
        assert!((level - 50.0).abs() < 1e-9);
    }

    #[test]
    fn yuyv_ignores_chroma() {
        // Y U Y V with saturated chroma
        let frame = [102, 255, 102, 255, 102, 0, 102, 0];
        let level = frame_light_level(&frame, PixelLayout::Yuyv).unwrap();
        assert!((level - 40.0).abs() < 1e-9);
    }

    #[test]
    fn empty_frame_has_no_level() {
        assert_eq!(frame_light_level(&[], PixelLayout::Grey), None);
        assert_eq!(frame_light_level(&[], PixelLayout::Yuyv), None);
    }

    fn fake_camera<S>(read_frame: S) -> CameraLightSensor
    where
        S: FnMut() -> Result<Option<LightLevel>> + Send + 'static,
    {
        CameraLightSensor {
            worker: Some(CaptureWorker::spawn(move || Ok(read_frame)).unwrap()),
        }
    }

    #[tokio::test]
    async fn readings_come_from_the_capture_thread() {
        let mut frames = vec![Ok(None), Err(AmbrightError::Other("busy".into())), Ok(Some(42.0))];
        let mut sensor = fake_camera(move || frames.pop().unwrap_or(Ok(None)));

        assert_eq!(sensor.read_light_level().await, Some(42.0));
        assert_eq!(sensor.read_light_level().await, None);
        assert_eq!(sensor.read_light_level().await, None);
        sensor.release();
    }

    #[tokio::test]
    async fn slow_frame_does_not_block_the_caller() {
        let mut sensor = fake_camera(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Some(10.0))
        });

        let started = std::time::Instant::now();
        let reading =
            tokio::time::timeout(Duration::from_millis(20), sensor.read_light_level()).await;
        assert!(reading.is_err());
        assert!(started.elapsed() < Duration::from_millis(250));
        sensor.release();
    }

    #[test]
    fn failed_open_is_reported() {
        let worker = CaptureWorker::spawn(|| -> Result<fn() -> Result<Option<LightLevel>>> {
            Err(AmbrightError::Other("no such device".into()))
        });
        assert!(worker.is_err());
    }

    #[tokio::test]
    async fn released_camera_reads_nothing() {
        let mut sensor = fake_camera(|| Ok(Some(1.0)));
        sensor.release();
        assert_eq!(sensor.read_light_level().await, None);
        sensor.release();
    }
}
