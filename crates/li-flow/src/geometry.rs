//! Popup placement — pure screen-geometry computation
//!
//! Kept separate from transport logic so the centering math is independently
//! testable.

use std::fmt;

/// Screen dimensions of the host display, supplied by the embedding
/// application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Placement and size of a destination popup window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupGeometry {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl PopupGeometry {
    /// Center a `width`×`height` popup on the given screen.
    ///
    /// Popups larger than the screen get negative offsets, matching what the
    /// equivalent browser computation produces.
    pub fn centered(screen: ScreenSize, width: u32, height: u32) -> Self {
        let left = (screen.width as i32) / 2 - (width as i32) / 2;
        let top = (screen.height as i32) / 2 - (height as i32) / 2;
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

impl fmt::Display for PopupGeometry {
    /// Render the window-features string consumed by browser-style hosts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "left={},top={},width={},height={}",
            self.left, self.top, self.width, self.height
        )
    }
}
