pub mod ticker;
pub mod types;

pub use ticker::Ticker;
pub use types::{FeatureError, FeatureResult, NativeFeature, NativeFeatureStatus, NativeFeatureType};
