//! Cross-fading image.
//!
//! [`FadingImage`] holds the image on display and, during a transition, the
//! image it replaces. A transition lasts one second of [`SharedTimeLine`]
//! frames; while it runs, [`render`](FadingImage::render) blends the previous
//! image out and the new one in.
//!
//! Assigning the same picture again (by MD5 of its PNG encoding) does nothing,
//! and neither does replacing one placeholder ("default") image with another.
//! An image assigned during a transition waits in a one-slot queue and is
//! shown when the transition ends.

use std::io::Cursor;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use md5::{Digest, Md5};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::timeline::{SharedTimeLine, DEFAULT_UPDATE_INTERVAL_MS};
use crate::error::Result;

/// Frames per percent of blend; a full transition takes 1000 frames.
const FRAMES_PER_PERCENT: f32 = 10.0;

/// What a call to [`FadingImage::set_image`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetImageOutcome {
    /// A transition to the image started.
    Started,
    /// The image waits for the running transition to end.
    Queued,
    /// Nothing changed.
    Ignored,
}

/// Cross-fading image view-model.
pub struct FadingImage {
    timeline: Arc<SharedTimeLine>,
    frames: Option<watch::Receiver<u64>>,
    image: Option<RgbaImage>,
    old_image: Option<RgbaImage>,
    queue: Option<RgbaImage>,
    fade_pct: f32,
    start_frame: u64,
    is_default: bool,
    old_image_md5: String,
    redraws: u64,
    on_clicked: Vec<Box<dyn FnMut() + Send>>,
}

impl std::fmt::Debug for FadingImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FadingImage")
            .field("fade_pct", &self.fade_pct)
            .field("is_default", &self.is_default)
            .field("animating", &self.is_animating())
            .field("queued", &self.queue.is_some())
            .field("redraws", &self.redraws)
            .finish()
    }
}

impl FadingImage {
    /// Create an empty view driven by `timeline`.
    ///
    /// The view starts out showing a default (placeholder) state.
    pub fn new(timeline: Arc<SharedTimeLine>) -> Self {
        Self {
            timeline,
            frames: None,
            image: None,
            old_image: None,
            queue: None,
            fade_pct: 100.0,
            start_frame: 0,
            is_default: true,
            old_image_md5: String::new(),
            redraws: 0,
            on_clicked: Vec::new(),
        }
    }

    /// Create a view on the process-wide timeline.
    pub fn with_shared_timeline() -> Self {
        Self::new(SharedTimeLine::instance())
    }

    /// Current blend percentage: 0 shows only the previous image, 100 only the
    /// current one.
    pub fn fade_pct(&self) -> f32 {
        self.fade_pct
    }

    /// Whether a transition is subscribed to the timeline.
    pub fn is_animating(&self) -> bool {
        self.frames.is_some()
    }

    /// Whether the shown image is a placeholder.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// The image being faded in (or shown).
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// The image being faded out, during a transition.
    pub fn old_image(&self) -> Option<&RgbaImage> {
        self.old_image.as_ref()
    }

    /// The image waiting for the current transition to end.
    pub fn queued_image(&self) -> Option<&RgbaImage> {
        self.queue.as_ref()
    }

    /// How many redraws have been requested so far.
    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    /// Register a click listener.
    pub fn on_clicked<F: FnMut() + Send + 'static>(&mut self, callback: F) {
        self.on_clicked.push(Box::new(callback));
    }

    /// Mouse button released over the view.
    pub fn mouse_release(&mut self) {
        for callback in &mut self.on_clicked {
            callback();
        }
    }

    fn repaint(&mut self) {
        self.redraws += 1;
    }

    /// Show `image`, fading from whatever is shown now.
    pub fn set_image(&mut self, image: RgbaImage, is_default: bool) -> SetImageOutcome {
        debug!("set_image, is_default: {}", is_default);

        if self.old_image.is_some() && !is_default {
            debug!("Transition running, queueing image");
            self.queue = Some(image);
            if self.is_default {
                self.on_animation_finished();
            }
            return SetImageOutcome::Queued;
        }

        if self.is_default && is_default {
            debug!("Default to default, doing nothing");
            return SetImageOutcome::Ignored;
        }

        let md5 = content_md5(&image);
        if md5 == self.old_image_md5 {
            debug!("Image md5s match, doing nothing");
            return SetImageOutcome::Ignored;
        }
        self.old_image_md5 = md5;

        self.old_image = self.image.take();
        self.image = Some(image);

        self.timeline.set_update_interval(DEFAULT_UPDATE_INTERVAL_MS);
        self.start_frame = self.timeline.current_frame();
        self.fade_pct = 0.0;
        self.is_default = is_default;
        self.frames = Some(self.timeline.subscribe());

        SetImageOutcome::Started
    }

    /// Advance the transition to `frame`.
    ///
    /// Redraws, and ends the transition once it reaches 100%.
    pub fn on_animation_step(&mut self, frame: u64) {
        let elapsed = frame.saturating_sub(self.start_frame) as f32;
        self.fade_pct = (elapsed / FRAMES_PER_PERCENT).min(100.0);

        self.repaint();

        if self.fade_pct >= 100.0 {
            self.on_animation_finished();
        }
    }

    /// End the transition: drop the previous image, leave the timeline and
    /// start on the queued image, if any.
    pub fn on_animation_finished(&mut self) {
        debug!("Fade finished");

        self.old_image = None;
        self.fade_pct = 100.0;
        self.repaint();
        self.frames = None;

        if let Some(next) = self.queue.take() {
            self.set_image(next, false);
        }
    }

    /// Wait for the next published frame and step to it.
    ///
    /// Returns `false` without waiting when no transition is running.
    pub async fn step(&mut self) -> bool {
        let Some(frames) = self.frames.as_mut() else {
            return false;
        };

        if frames.changed().await.is_err() {
            warn!("Timeline stopped during a fade");
            self.on_animation_finished();
            return false;
        }

        let frame = *frames.borrow_and_update();
        self.on_animation_step(frame);
        true
    }

    /// Run transitions until none is left, queued ones included.
    pub async fn animate(&mut self) {
        while self.step().await {}
    }

    /// Render the view at `width` x `height`.
    ///
    /// The previous image is painted at opacity `(100 - pct) / 100`, the
    /// current one over it at `pct / 100`.
    pub fn render(&self, width: u32, height: u32) -> RgbaImage {
        let mut canvas = RgbaImage::new(width, height);
        let opacity = self.fade_pct / 100.0;

        if let Some(old) = &self.old_image {
            paint(&mut canvas, old, 1.0 - opacity);
        }
        if let Some(image) = &self.image {
            paint(&mut canvas, image, opacity);
        }

        canvas
    }
}

/// MD5 over the PNG encoding of `image`, hex encoded.
///
/// Falls back to hashing the raw pixels if encoding fails.
pub fn content_md5(image: &RgbaImage) -> String {
    match png_bytes(image) {
        Ok(png) => md5_hex_bytes(&png),
        Err(e) => {
            warn!("Could not encode image for hashing: {}", e);
            let mut raw = Vec::with_capacity(image.as_raw().len() + 8);
            raw.extend_from_slice(&image.width().to_be_bytes());
            raw.extend_from_slice(&image.height().to_be_bytes());
            raw.extend_from_slice(image.as_raw());
            md5_hex_bytes(&raw)
        }
    }
}

fn png_bytes(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Compute MD5 hash of bytes and return as hex string.
fn md5_hex_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Paint `source`, scaled to the canvas, over the canvas at `opacity`.
fn paint(canvas: &mut RgbaImage, source: &RgbaImage, opacity: f32) {
    if opacity <= 0.0 || canvas.width() == 0 || canvas.height() == 0 {
        return;
    }

    let scaled;
    let source = if source.dimensions() == canvas.dimensions() {
        source
    } else {
        scaled = imageops::resize(source, canvas.width(), canvas.height(), FilterType::Triangle);
        &scaled
    };

    for (dst, src) in canvas.pixels_mut().zip(source.pixels()) {
        *dst = source_over(*dst, *src, opacity.min(1.0));
    }
}

/// Porter-Duff source-over with straight alpha.
fn source_over(dst: Rgba<u8>, src: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * opacity;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let c = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round() as u8,
    ])
}
