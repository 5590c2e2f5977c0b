pub mod candle;
pub mod dataset;
pub mod series;
pub mod timeframe;

pub use candle::Candle;
pub use dataset::{Provenance, SeriesKind, TimeframeDataset};
pub use timeframe::Timeframe;
