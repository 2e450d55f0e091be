//! Box geometry shared by the converter and label readers.
//!
//! Pixel-space boxes are VOC-style corners; normalized boxes are YOLO-style
//! center/size fractions. The space is carried in the type so the two can
//! only meet through an explicit conversion with image dimensions.
//!
//! ```
//! use yoloprep::geom::{BBoxXYXY, NormalizedBox, Pixel};
//!
//! let bbox = BBoxXYXY::<Pixel>::from_xyxy(100.0, 50.0, 300.0, 250.0);
//! let row = NormalizedBox::from_pixel(0, &bbox, 640, 480);
//! assert_eq!(row.to_label_line(), "0 0.312500 0.312500 0.312500 0.416667");
//! ```

mod bbox;
mod space;
pub mod yolo;

pub use bbox::{BBoxXYXY, Coord};
pub use space::{Normalized, Pixel};
pub use yolo::{decode_label_file, encode_label_file, NormalizedBox, LABEL_PRECISION};
