//! Image output: grids as grayscale images, keypoint markers and match lines.

use crate::PipelineResult;
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_antialiased_line_segment_mut, draw_hollow_circle_mut};
use imageproc::pixelops;
use sift_core::{Grid, KeyPoint};
use std::f64::consts::TAU;
use std::path::Path;

pub const KEYPOINT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Marker radius for a unit-scale keypoint.
pub const KEYPOINT_RADIUS: i32 = 3;

/// Grid rescaled to `[0, 255]` as an 8-bit image.
pub fn grid_to_gray(grid: &Grid) -> GrayImage {
    let bytes = grid.to_luma8();
    let width = grid.width();
    GrayImage::from_fn(grid.width() as u32, grid.height() as u32, |x, y| {
        Luma([bytes[y as usize * width + x as usize]])
    })
}

/// Saves a grid as an image; the format follows the file extension.
pub fn save_grid<P: AsRef<Path>>(grid: &Grid, path: P) -> PipelineResult<()> {
    grid_to_gray(grid).save(path)?;
    Ok(())
}

pub fn grid_to_rgba(grid: &Grid) -> RgbaImage {
    DynamicImage::ImageLuma8(grid_to_gray(grid)).into_rgba8()
}

/// Draws a circle per keypoint, shifted right by `x_offset`. The radius grows with sigma.
pub fn draw_keypoints(canvas: &mut RgbaImage, points: &[KeyPoint], color: Rgba<u8>, x_offset: u32) {
    for p in points {
        let radius = ((KEYPOINT_RADIUS as f64 * p.sigma).round() as i32).max(KEYPOINT_RADIUS);
        let center = (p.x.round() as i32 + x_offset as i32, p.y.round() as i32);
        draw_hollow_circle_mut(canvas, center, radius, color);
    }
}

/// Places `b` to the right of `a` on a black canvas.
pub fn join_images(a: &RgbaImage, b: &RgbaImage) -> RgbaImage {
    let width = a.width() + b.width();
    let height = a.height().max(b.height());
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    image::imageops::replace(&mut canvas, a, 0, 0);
    image::imageops::replace(&mut canvas, b, a.width() as i64, 0);
    canvas
}

/// Fully saturated colour for the `index`-th match, stepping around the hue circle.
pub fn match_color(index: usize) -> Rgba<u8> {
    let hue = (index as f64 * 0.1).rem_euclid(TAU) / TAU * 6.0;
    let sector = hue.floor();
    let f = hue - sector;
    let (r, g, b) = match sector as u8 {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    Rgba([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, 255])
}

/// Draws one line per `(index_in_a, index_in_b)` match; `b` points are shifted by `x_offset`.
pub fn draw_matches(
    canvas: &mut RgbaImage,
    points_a: &[KeyPoint],
    points_b: &[KeyPoint],
    matches: &[(usize, usize)],
    x_offset: u32,
) {
    for (index, &(a, b)) in matches.iter().enumerate() {
        let (Some(pa), Some(pb)) = (points_a.get(a), points_b.get(b)) else {
            continue;
        };
        draw_antialiased_line_segment_mut(
            canvas,
            (pa.x.round() as i32, pa.y.round() as i32),
            (pb.x.round() as i32 + x_offset as i32, pb.y.round() as i32),
            match_color(index),
            pixelops::interpolate,
        );
    }
}

/// Image with keypoint markers.
pub fn render_keypoints(grid: &Grid, points: &[KeyPoint]) -> RgbaImage {
    let mut canvas = grid_to_rgba(grid);
    draw_keypoints(&mut canvas, points, KEYPOINT_COLOR, 0);
    canvas
}

/// Side-by-side images with keypoints and match lines.
pub fn render_matches(
    grid_a: &Grid,
    points_a: &[KeyPoint],
    grid_b: &Grid,
    points_b: &[KeyPoint],
    matches: &[(usize, usize)],
) -> RgbaImage {
    let offset = grid_a.width() as u32;
    let mut canvas = join_images(&grid_to_rgba(grid_a), &grid_to_rgba(grid_b));
    draw_keypoints(&mut canvas, points_a, KEYPOINT_COLOR, 0);
    draw_keypoints(&mut canvas, points_b, KEYPOINT_COLOR, offset);
    draw_matches(&mut canvas, points_a, points_b, matches, offset);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_conversion_spans_range() {
        let grid = Grid::from_rows(&[[0.0, 0.5], [1.0, 0.25]]).unwrap();
        let gray = grid_to_gray(&grid);
        assert_eq!(gray.dimensions(), (2, 2));
        assert_eq!(gray.get_pixel(0, 0)[0], 0);
        assert_eq!(gray.get_pixel(0, 1)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 128);
    }

    #[test]
    fn test_join_images() {
        let a = RgbaImage::from_pixel(4, 3, Rgba([255, 255, 255, 255]));
        let b = RgbaImage::from_pixel(5, 6, Rgba([10, 20, 30, 255]));
        let joined = join_images(&a, &b);
        assert_eq!(joined.dimensions(), (9, 6));
        assert_eq!(*joined.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*joined.get_pixel(0, 5), Rgba([0, 0, 0, 255]));
        assert_eq!(*joined.get_pixel(4, 5), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_match_colors_are_stable_and_saturated() {
        assert_eq!(match_color(0), Rgba([255, 0, 0, 255]));
        assert_eq!(match_color(7), match_color(7));
        assert_ne!(match_color(0), match_color(20));
        for i in 0..100 {
            let c = match_color(i);
            assert_eq!(c[3], 255);
            assert!(c[0] == 255 || c[1] == 255 || c[2] == 255);
        }
    }

    #[test]
    fn test_keypoint_marker_drawn() {
        let grid = Grid::new(20, 20);
        let canvas = render_keypoints(&grid, &[KeyPoint::new(10.0, 10.0, 1.0)]);
        assert_eq!(*canvas.get_pixel(13, 10), KEYPOINT_COLOR);
        assert_eq!(*canvas.get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    }
}
