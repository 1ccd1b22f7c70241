//! Alert marker drawn onto the final frame of an event clip.

use image::{ImageBuffer, Rgb, RgbImage};

use shield_models::{EventType, Frame};

use crate::error::{MediaError, MediaResult};

/// Marker colour per event type.
pub fn alert_color(event_type: EventType) -> Rgb<u8> {
    match event_type {
        EventType::Fire => Rgb([255, 0, 0]),
        EventType::Violence => Rgb([255, 128, 0]),
        EventType::Stampede => Rgb([255, 220, 0]),
    }
}

/// Return a copy of `frame` with a visible alert marker: a solid border plus
/// a filled banner block in the top-left corner.
///
/// The input frame is not modified.
pub fn draw_alert_marker(frame: &Frame, event_type: EventType) -> MediaResult<Frame> {
    let (width, height) = (frame.width(), frame.height());
    let mut img: RgbImage = ImageBuffer::from_raw(width, height, frame.data().to_vec())
        .ok_or_else(|| MediaError::encode("frame buffer does not match its dimensions"))?;

    let color = alert_color(event_type);
    let thickness = (width.min(height) / 60).max(2);

    // Border
    fill_rect(&mut img, 0, 0, width, thickness, color);
    fill_rect(&mut img, 0, height.saturating_sub(thickness), width, thickness, color);
    fill_rect(&mut img, 0, 0, thickness, height, color);
    fill_rect(&mut img, width.saturating_sub(thickness), 0, thickness, height, color);

    // Banner
    let banner_x = thickness * 3;
    let banner_y = thickness * 3;
    let banner_w = (width / 4).max(1);
    let banner_h = (height / 12).max(1);
    fill_rect(&mut img, banner_x, banner_y, banner_w, banner_h, color);

    Ok(frame.with_data(img.into_raw())?)
}

/// Fill a rectangle, clipped to the image bounds.
fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = x.saturating_add(w).min(img.width());
    let y_end = y.saturating_add(h).min(img.height());
    for py in y.min(y_end)..y_end {
        for px in x.min(x_end)..x_end {
            img.put_pixel(px, py, color);
        }
    }
}
