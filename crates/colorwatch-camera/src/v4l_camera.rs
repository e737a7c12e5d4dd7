//! Video4Linux capture device.

use colorwatch_core::detector::FrameSource;
use colorwatch_core::{ColorwatchError, ColorwatchResult};
use image::{ImageFormat, RgbImage};
use tracing::info;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const BUFFER_COUNT: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelFormat {
    Mjpeg,
    Yuyv,
}

/// A `/dev/videoN` device streaming over mmap buffers.
///
/// The device is released when the camera is dropped.
pub struct V4lCamera {
    // holds the device handle; closing it releases the camera
    stream: Stream<'static>,
    index: usize,
    format: PixelFormat,
    width: u32,
    height: u32,
}

impl V4lCamera {
    /// Open `/dev/video{index}`, preferring MJPEG and falling back to YUYV.
    pub fn open(index: usize) -> ColorwatchResult<Self> {
        let device = Device::new(index)
            .map_err(|e| ColorwatchError::frame_source(format!("cannot open /dev/video{}: {}", index, e)))?;

        let mut fmt = device.format()?;
        fmt.fourcc = FourCC::new(b"MJPG");
        let mut fmt = device.set_format(&fmt)?;
        if fmt.fourcc != FourCC::new(b"MJPG") {
            fmt.fourcc = FourCC::new(b"YUYV");
            fmt = device.set_format(&fmt)?;
        }
        let format = if fmt.fourcc == FourCC::new(b"MJPG") {
            PixelFormat::Mjpeg
        } else if fmt.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else {
            return Err(ColorwatchError::frame_source(format!(
                "/dev/video{} offers neither MJPG nor YUYV (got {})",
                index, fmt.fourcc
            )));
        };

        let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
        info!(
            device = index,
            width = fmt.width,
            height = fmt.height,
            ?format,
            "Camera opened"
        );

        Ok(Self {
            stream,
            index,
            format,
            width: fmt.width,
            height: fmt.height,
        })
    }
}

impl FrameSource for V4lCamera {
    fn next_frame(&mut self) -> ColorwatchResult<Option<RgbImage>> {
        let (buf, meta) = self.stream.next()?;
        let used = (meta.bytesused as usize).min(buf.len());
        let data = &buf[..used];

        let frame = match self.format {
            PixelFormat::Mjpeg => {
                image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()
            }
            PixelFormat::Yuyv => yuyv_to_rgb(data, self.width, self.height)?,
        };
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("camera /dev/video{} ({}x{})", self.index, self.width, self.height)
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        info!(device = self.index, "Camera released");
    }
}

/// Expand packed YUYV 4:2:2 into RGB.
///
/// BT.601 studio range in 20-bit fixed point, the same integer arithmetic as
/// the reference `YUV2RGB_YUYV` conversion, so hue rounding downstream sees
/// identical pixels.
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> ColorwatchResult<RgbImage> {
    let expected = width as usize * height as usize * 2;
    if data.len() < expected {
        return Err(ColorwatchError::frame_source(format!(
            "short YUYV frame: {} bytes, expected {}",
            data.len(),
            expected
        )));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in data[..expected].chunks_exact(4) {
        let chroma = Chroma::new(chunk[1], chunk[3]);
        for y in [chunk[0], chunk[2]] {
            rgb.extend_from_slice(&chroma.apply(y));
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ColorwatchError::frame_source("YUYV frame size mismatch"))
}

const YUV_SHIFT: i32 = 20;
const YUV_HALF: i32 = 1 << (YUV_SHIFT - 1);
const CY: i32 = 1_220_542;
const CVR: i32 = 1_673_527;
const CVG: i32 = -852_492;
const CUG: i32 = -409_993;
const CUB: i32 = 2_116_026;

/// Chroma terms shared by both pixels of a macropixel.
struct Chroma {
    ruv: i32,
    guv: i32,
    buv: i32,
}

impl Chroma {
    fn new(u: u8, v: u8) -> Self {
        let u = i32::from(u) - 128;
        let v = i32::from(v) - 128;
        Self {
            ruv: YUV_HALF + CVR * v,
            guv: YUV_HALF + CVG * v + CUG * u,
            buv: YUV_HALF + CUB * u,
        }
    }

    fn apply(&self, y: u8) -> [u8; 3] {
        let yy = (i32::from(y) - 16).max(0) * CY;
        let channel = |uv: i32| ((yy + uv) >> YUV_SHIFT).clamp(0, 255) as u8;
        [channel(self.ruv), channel(self.guv), channel(self.buv)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_gray_and_size() {
        // two gray pixels per macropixel, 4x1 frame
        let data = [128, 128, 128, 128, 128, 128, 128, 128];
        let img = yuyv_to_rgb(&data, 4, 1).unwrap();
        assert_eq!(img.get_pixel(3, 0).0, [130, 130, 130]);

        assert!(yuyv_to_rgb(&data[..4], 4, 1).is_err());
    }

    #[test]
    fn test_yuyv_matches_reference_conversion() {
        let cases = [
            ((16, 128, 128), [0, 0, 0]),
            ((235, 128, 128), [255, 255, 255]),
            ((41, 240, 110), [0, 0, 255]),
            ((81, 90, 240), [254, 0, 0]),
        ];
        for ((y, u, v), expected) in cases {
            let img = yuyv_to_rgb(&[y, u, y, v], 2, 1).unwrap();
            assert_eq!(img.get_pixel(0, 0).0, expected, "yuv {:?}", (y, u, v));
            assert_eq!(img.get_pixel(1, 0).0, expected);
        }
    }
}
