mod convert;
mod error;
mod pointing;
mod site;

pub use convert::{CoordinateConverter, SiderealConverter};
pub use error::AstroError;
pub use pointing::{NullPointingModel, ParametricPointingModel, PointingModel};
pub use site::{parse_dec, parse_ra, Site};
