//! Headless view-models for animated and data-driven widgets.
//!
//! - [`timeline`]: the process-wide animation clock
//! - [`fading`]: cross-fading image
//! - [`whatshot`]: charts browser

pub mod fading;
pub mod timeline;
pub mod whatshot;

pub use fading::{FadingImage, SetImageOutcome};
pub use timeline::SharedTimeLine;
pub use whatshot::{ChartView, CrumbNode, WhatsHot};
