pub mod cnb;
pub mod open_meteo;
pub mod ote;
pub mod util;

pub use cnb::CnbRateProvider;
pub use open_meteo::OpenMeteoProvider;
pub use ote::OteProvider;
