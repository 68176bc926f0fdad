//! EXIF image orientation.

use serde::{Deserialize, Serialize};

/// How the stored pixels map onto the displayed image, named after where
/// the first stored row and column end up (EXIF tag 0x0112).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// 1 - stored as displayed
    #[default]
    TopLeft,
    /// 2 - mirrored horizontally
    TopRight,
    /// 3 - rotated 180°
    BottomRight,
    /// 4 - mirrored vertically
    BottomLeft,
    /// 5 - mirrored horizontally, then rotated 270° clockwise
    LeftTop,
    /// 6 - rotated 90° clockwise
    RightTop,
    /// 7 - mirrored horizontally, then rotated 90° clockwise
    RightBottom,
    /// 8 - rotated 270° clockwise
    LeftBottom,
}

impl Orientation {
    /// Parse the raw EXIF value. Out-of-range values yield `None`.
    pub fn from_exif(value: u16) -> Option<Self> {
        Some(match value {
            1 => Self::TopLeft,
            2 => Self::TopRight,
            3 => Self::BottomRight,
            4 => Self::BottomLeft,
            5 => Self::LeftTop,
            6 => Self::RightTop,
            7 => Self::RightBottom,
            8 => Self::LeftBottom,
            _ => return None,
        })
    }

    /// Raw EXIF value.
    pub fn exif_value(self) -> u16 {
        match self {
            Self::TopLeft => 1,
            Self::TopRight => 2,
            Self::BottomRight => 3,
            Self::BottomLeft => 4,
            Self::LeftTop => 5,
            Self::RightTop => 6,
            Self::RightBottom => 7,
            Self::LeftBottom => 8,
        }
    }

    /// True when width and height trade places on display.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::LeftTop | Self::RightTop | Self::RightBottom | Self::LeftBottom
        )
    }
}

impl From<image::metadata::Orientation> for Orientation {
    fn from(value: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as Img;
        match value {
            Img::NoTransforms => Self::TopLeft,
            Img::FlipHorizontal => Self::TopRight,
            Img::Rotate180 => Self::BottomRight,
            Img::FlipVertical => Self::BottomLeft,
            Img::Rotate90FlipH => Self::LeftTop,
            Img::Rotate90 => Self::RightTop,
            Img::Rotate270FlipH => Self::RightBottom,
            Img::Rotate270 => Self::LeftBottom,
        }
    }
}
