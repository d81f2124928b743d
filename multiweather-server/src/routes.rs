//! HTTP surface: `/hello` and `/weather/<city>`.

use std::{convert::Infallible, sync::Arc, time::Instant};

use multiweather_core::{Aggregator, TemperatureProvider, WeatherReport};
use thiserror::Error;
use warp::{
    Filter, Rejection, Reply,
    http::{StatusCode, header::CONTENT_TYPE},
    path::FullPath,
    reply::Response,
};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A request the handler cannot serve.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing city in path '{0}', expected /weather/<city>")]
    MissingCity(String),

    #[error("path '{0}' is not valid percent-encoded UTF-8")]
    InvalidEncoding(String),
}

/// All routes, sharing one read-only aggregator.
pub fn routes(
    aggregator: Arc<Aggregator>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let hello = warp::get().and(warp::path("hello")).and(warp::path::end()).map(|| "hello!");

    let weather = warp::get()
        .and(warp::path("weather"))
        .and(warp::path::full())
        .and(warp::any().map(move || aggregator.clone()))
        .and_then(weather);

    hello.or(weather).with(warp::trace::request())
}

/// Everything after `/weather/`, percent-decoded.
pub fn city_from_path(path: &str) -> Result<String, RequestError> {
    let decoded = urlencoding::decode(path)
        .map_err(|_| RequestError::InvalidEncoding(path.to_string()))?;

    match decoded.splitn(3, '/').nth(2) {
        Some(city) if !city.is_empty() => Ok(city.to_string()),
        _ => Err(RequestError::MissingCity(path.to_string())),
    }
}

async fn weather(path: FullPath, aggregator: Arc<Aggregator>) -> Result<Response, Infallible> {
    let city = match city_from_path(path.as_str()) {
        Ok(city) => city,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting weather request");
            return Ok(warp::reply::with_status(err.to_string(), StatusCode::BAD_REQUEST).into_response());
        }
    };

    let begin = Instant::now();
    match aggregator.temperature(&city).await {
        Ok(temp) => {
            let report = WeatherReport::new(city, temp, begin.elapsed());
            let reply = warp::reply::with_header(warp::reply::json(&report), CONTENT_TYPE, JSON_CONTENT_TYPE);
            Ok(reply.into_response())
        }
        Err(err) => {
            tracing::error!(%city, provider = err.provider(), error = %err, "aggregation failed");
            Ok(warp::reply::with_status(err.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response())
        }
    }
}
