use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;

pub const MASK_ON: u8 = 0xFF;
pub const MASK_OFF: u8 = 0x00;

/// Luma channel of the YCbCr conversion.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum = luma(pixel[0], pixel[1], pixel[2]) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

/// Unquantised luma plane indexed as `[[y, x]]`.
pub fn luma_plane(image: &RgbImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut plane = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        plane[[y as usize, x as usize]] = luma(pixel[0], pixel[1], pixel[2]);
    }

    plane
}

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

#[inline]
pub fn is_on(value: u8) -> bool {
    value > 127
}

pub fn binarize_mask(mask: &GrayImage) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut binary = GrayImage::new(width, height);

    for (x, y, pixel) in mask.enumerate_pixels() {
        let value = if is_on(pixel[0]) { MASK_ON } else { MASK_OFF };
        binary.put_pixel(x, y, Luma([value]));
    }

    binary
}

pub fn count_on(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| is_on(p[0])).count()
}

/// True when every ON pixel of `inner` is also ON in `outer`.
pub fn mask_contains(outer: &GrayImage, inner: &GrayImage) -> bool {
    outer.dimensions() == inner.dimensions()
        && outer
            .pixels()
            .zip(inner.pixels())
            .all(|(o, i)| !is_on(i[0]) || is_on(o[0]))
}
