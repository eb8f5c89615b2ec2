//! Owned 8-bit images with interleaved channels.
//!
//! [`Image`] is the pixel container the resampler reads from and writes into. It
//! stores any number of channels per pixel, row-major and interleaved, and converts
//! to and from [`image::DynamicImage`] for the 1 to 4 channel layouts the codecs know.

use crate::camera::ImageSize;
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<u8>,
}

impl Image {
    /// Creates a zero-filled image.
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        Self::filled(width, height, channels, 0)
    }

    /// Creates an image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: usize, value: u8) -> Self {
        let len = width as usize * height as usize * channels;
        Self {
            width,
            height,
            channels,
            data: vec![value; len],
        }
    }

    /// Wraps an existing row-major interleaved buffer.
    ///
    /// Returns `None` when `data.len() != width * height * channels`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use undistort_tools::frame::Image;
    ///
    /// let image = Image::from_raw(2, 1, 3, vec![255, 0, 0, 0, 255, 0]).unwrap();
    /// assert_eq!(image.pixel(1, 0), Some(&[0, 255, 0][..]));
    /// assert!(Image::from_raw(2, 2, 3, vec![0; 6]).is_none());
    /// ```
    pub fn from_raw(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * channels {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    /// True when the image holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Samples of the pixel at `(x, y)`, or `None` outside the image.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        let start = self.offset(x, y)?;
        self.data.get(start..start + self.channels)
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        let start = self.offset(x, y)?;
        let channels = self.channels;
        self.data.get_mut(start..start + channels)
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * self.channels)
    }

    /// Converts a decoded image, keeping its channel layout.
    ///
    /// Gray images become 1 channel, gray with alpha 2, RGB 3 and anything with more
    /// channels 4. Samples deeper than 8 bits are scaled down.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let channels = image.color().channel_count() as usize;
        let (channels, data) = match channels {
            1 => (1, image.to_luma8().into_raw()),
            2 => (2, image.to_luma_alpha8().into_raw()),
            3 => (3, image.to_rgb8().into_raw()),
            _ => (4, image.to_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Converts to a [`DynamicImage`] for encoding.
    ///
    /// Returns `None` for channel counts other than 1 to 4.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let data = self.data.clone();
        match self.channels {
            1 => GrayImage::from_raw(w, h, data).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, data).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, data).map(DynamicImage::ImageRgba8),
            _ => None,
        }
    }
}
