//! Plate localisation by contour search.
//!
//! grayscale -> bilateral smoothing -> canny edges -> largest contours ->
//! first contour whose polygon approximation has four corners -> filled mask
//! -> crop of the mask's bounding box.

use image::{ DynamicImage, GrayImage, Luma, Rgb, imageops };
use imageproc::contours::find_contours;
use imageproc::drawing::{ draw_line_segment_mut, draw_polygon_mut };
use imageproc::edges::canny;
use imageproc::filter::bilateral_filter;
use imageproc::geometry::arc_length;
use imageproc::point::Point;
use log::debug;

use std::cmp::Ordering;
use std::path::Path;

use crate::config::LocatorParams;
use crate::error::VrError;
use crate::utils::{ approximate_closed_polygon, contour_area };

pub type Quad = [Point<i32>; 4];

pub struct PlateLocator {
    params: LocatorParams,
}

impl Default for PlateLocator {
    fn default() -> Self {
        Self::new(LocatorParams::default())
    }
}

impl PlateLocator {

    pub fn new(params: LocatorParams) -> Self {
        Self { params }
    }

    /// Cropped grayscale plate region, `None` when no four-cornered contour is found
    pub fn locate(&self, img: &DynamicImage) -> Option<GrayImage> {
        let smoothed = self.smooth(img);
        let quad = self.select_quad(&self.candidates(&smoothed))?;
        let mask = quad_mask(smoothed.width(), smoothed.height(), &quad);
        let (x0, y0, x1, y1) = mask_bounds(&mask)?;
        debug!("plate region x {}..={} y {}..={}", x0, x1, y0, y1);
        Some(imageops::crop_imm(&smoothed, x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image())
    }

    /// corners of the selected plate contour
    pub fn find_plate_quad(&self, img: &DynamicImage) -> Option<Quad> {
        let smoothed = self.smooth(img);
        self.select_quad(&self.candidates(&smoothed))
    }

    /// Saves a copy of `img` with the detected plate outlined in green.
    /// Returns whether a plate was found; the image is written either way.
    pub fn draw_detection(&self, img: &DynamicImage, output: impl AsRef<Path>) -> Result<bool, VrError> {
        let quad = self.find_plate_quad(img);
        let mut canvas = img.to_rgb8();
        if let Some(quad) = &quad {
            let green = Rgb([0, 255, 0]);
            for (i, start) in quad.iter().enumerate() {
                let end = quad[(i + 1) % quad.len()];
                // 3 px thick
                for offset in -1..=1 {
                    let o = offset as f32;
                    draw_line_segment_mut(&mut canvas, (start.x as f32 + o, start.y as f32), (end.x as f32 + o, end.y as f32), green);
                    draw_line_segment_mut(&mut canvas, (start.x as f32, start.y as f32 + o), (end.x as f32, end.y as f32 + o), green);
                }
            }
        }
        canvas.save(output)?;
        Ok(quad.is_some())
    }

    fn smooth(&self, img: &DynamicImage) -> GrayImage {
        let params = &self.params;
        bilateral_filter(&img.to_luma8(), params.bilateral_diameter, params.sigma_color, params.sigma_space)
    }

    /// The largest contours of the edge map, biggest first
    fn candidates(&self, smoothed: &GrayImage) -> Vec<Vec<Point<i32>>> {
        let edges = canny(smoothed, self.params.canny_low, self.params.canny_high);
        let mut contours: Vec<(Vec<Point<i32>>, f64)> = find_contours::<i32>(&edges).into_iter()
            .map(|contour| {
                let area = contour_area(&contour.points);
                (contour.points, area)
            })
            .collect();
        debug!("{} contours in edge map", contours.len());
        // stable: equal areas keep discovery order
        contours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        contours.truncate(self.params.max_candidates);
        contours.into_iter().map(|(points, _)| points).collect()
    }

    /// First candidate that approximates to exactly four corners. Greedy: a
    /// larger four-cornered region always beats a better-shaped smaller one.
    fn select_quad(&self, candidates: &[Vec<Point<i32>>]) -> Option<Quad> {
        for (rank, points) in candidates.iter().enumerate() {
            if points.len() < 4 {
                continue;
            }
            let perimeter = arc_length(points, true);
            if perimeter <= 0.0 {
                continue;
            }
            let approx = approximate_closed_polygon(points, self.params.epsilon_factor * perimeter);
            if let [a, b, c, d] = approx[..] {
                debug!("candidate {} selected, perimeter {:.1}", rank, perimeter);
                return Some([a, b, c, d]);
            }
        }
        None
    }
}

/// `width` x `height` mask with the quad filled with 255 on 0
pub fn quad_mask(width: u32, height: u32, quad: &Quad) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    draw_polygon_mut(&mut mask, quad, Luma([255]));
    mask
}

/// (min x, min y, max x, max y) of all 255 pixels, inclusive
pub fn mask_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    mask.enumerate_pixels()
        .filter(|(_, _, pixel)| pixel.0[0] == 255)
        .fold(None, |bounds, (x, y, _)| match bounds {
            None => Some((x, y, x, y)),
            Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
        })
}

#[cfg(test)]
mod test {

    use image::{ DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage };
    use imageproc::drawing::{ draw_filled_circle_mut, draw_filled_rect_mut };
    use imageproc::point::Point;
    use imageproc::rect::Rect;

    use std::error::Error;

    use super::{ PlateLocator, mask_bounds, quad_mask };

    fn p(x: i32, y: i32) -> Point<i32> {
        Point::new(x, y)
    }

    /// dark car body with a bright plate rectangle spanning x 60..=179, y 90..=139
    fn car_with_plate() -> DynamicImage {
        let mut img: RgbImage = ImageBuffer::from_pixel(240, 200, Rgb([40, 40, 40]));
        draw_filled_rect_mut(&mut img, Rect::at(60, 90).of_size(120, 50), Rgb([235, 235, 235]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn uniform_image_has_no_plate() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(120, 90, Rgb([128, 128, 128])));
        assert!(PlateLocator::default().locate(&img).is_none());
    }

    #[test]
    fn smooth_gradient_has_no_plate() {
        let img: GrayImage = ImageBuffer::from_fn(200, 100, |x, _| Luma([x as u8]));
        assert!(PlateLocator::default().locate(&DynamicImage::ImageLuma8(img)).is_none());
    }

    #[test]
    fn round_shape_is_not_a_plate() {
        let mut img: GrayImage = ImageBuffer::from_pixel(200, 200, Luma([20]));
        draw_filled_circle_mut(&mut img, (100, 100), 60, Luma([230]));
        assert!(PlateLocator::default().find_plate_quad(&DynamicImage::ImageLuma8(img)).is_none());
    }

    #[test]
    fn finds_bright_rectangle() {
        let locator = PlateLocator::default();
        let img = car_with_plate();

        let quad = locator.find_plate_quad(&img).expect("no quad found");
        for corner in &[p(60, 90), p(179, 90), p(179, 139), p(60, 139)] {
            assert!(quad.iter().any(|q| (q.x - corner.x).abs() <= 4 && (q.y - corner.y).abs() <= 4),
                "{:?} not near any of {:?}", corner, quad);
        }

        let plate = locator.locate(&img).expect("no plate found");
        let (width, height) = plate.dimensions();
        assert!((112..=128).contains(&width), "width {}", width);
        assert!((42..=58).contains(&height), "height {}", height);
    }

    #[test]
    fn locate_is_idempotent() {
        let locator = PlateLocator::default();
        let img = car_with_plate();
        assert_eq!(locator.locate(&img), locator.locate(&img));
    }

    #[test]
    fn larger_quad_wins_over_smaller() {
        let locator = PlateLocator::default();
        let triangle: Vec<_> = (0..30).map(|i| p(i, 0))
            .chain((0..30).map(|i| p(30 - i, i)))
            .chain((0..30).map(|i| p(0, 30 - i)))
            .collect();
        let big = vec![p(0, 0), p(100, 0), p(100, 40), p(0, 40)];
        let small = vec![p(0, 0), p(10, 0), p(10, 4), p(0, 4)];
        let quad = locator.select_quad(&[triangle, big, small]);
        assert_eq!(quad, Some([p(0, 0), p(100, 0), p(100, 40), p(0, 40)]));
    }

    #[test]
    fn mask_bounds_cover_quad() {
        let quad = [p(10, 5), p(30, 5), p(30, 20), p(10, 20)];
        let mask = quad_mask(40, 30, &quad);
        assert_eq!(mask_bounds(&mask), Some((10, 5, 30, 20)));
        assert_eq!(mask.get_pixel(20, 12).0[0], 255);
        assert_eq!(mask.get_pixel(35, 25).0[0], 0);
        assert_eq!(mask_bounds(&GrayImage::new(4, 4)), None);
    }

    #[test]
    fn draws_detection_overlay() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("overlay.png");
        let found = PlateLocator::default().draw_detection(&car_with_plate(), &output)?;
        assert!(found);
        let overlay = image::open(&output)?.to_rgb8();
        assert_eq!(overlay.dimensions(), (240, 200));
        assert!(overlay.pixels().any(|px| *px == Rgb([0, 255, 0])));
        Ok(())
    }
}
