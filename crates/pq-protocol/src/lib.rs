pub mod decision;
pub mod history;
pub mod intent;
pub mod model;
pub mod params;

pub use decision::*;
pub use history::*;
pub use intent::*;
pub use model::*;
pub use params::*;
