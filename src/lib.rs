mod config;
mod db;
mod error;
mod features;
mod http;
mod measurements;
mod pipeline;
mod satellite;
mod stations;
mod types;
mod utils;
mod weather;

pub use config::{ConfigError, EtlConfig, Region};
pub use error::EtlError;
pub use pipeline::{Pipeline, RunSummary};

pub use db::{Database, DbError};
pub use features::{FeatureAssembler, FeatureError, FeatureRow};
pub use http::{ApiRequest, HttpError, ReqwestTransport, RetryPolicy, RetryingClient, Transport};
pub use measurements::{FeedPolicy, IngestSummary, MeasurementError, MeasurementIngester};
pub use satellite::{
    decode_grid, CsvObservation, GranuleDownloader, GranuleSource, GranuleSpec, GridSource,
    PackedVariable, PixelFilter, ProductKind, QualityCheck, SatelliteError, SatelliteIngester,
    SatelliteRecord,
};
pub use stations::{filter_active, ListingPolicy, StationDirectory, StationError};
pub use weather::{WeatherError, WeatherIngester, POLLUTION_STATION};

pub use types::measurement::{MeasurementRecord, NewMeasurement};
pub use types::parameter::Parameter;
pub use types::provider::Provider;
pub use types::station::{Coordinates, LocationRecord, NewStation, StationKind};
pub use types::weather::{CurrentWeather, PollutionResponse, WeatherObservation};
