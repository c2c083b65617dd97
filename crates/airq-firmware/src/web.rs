//! Read-only WebThing HTTP transport
//!
//! Serves the thing description and the current property values out of the
//! shared property store. Property writes are not accepted.

use core::str::FromStr;

use airq_core::properties::{PropertyId, SharedProperties};
use airq_core::thing::{PROPERTIES_HREF, PropertyValues, THING_HREF, ThingDescription};
use embassy_net::Stack;
use embassy_time::Duration;
use picoserve::extract::State;
use picoserve::response::{IntoResponse, Json};
use picoserve::routing::{get, parse_path_segment};
use picoserve::{AppWithStateBuilder, Router};

pub const WEB_TASK_POOL_SIZE: usize = 2;

const HTTP_PORT: u16 = 80;

#[derive(Clone, Copy)]
pub struct AppState {
    pub properties: &'static SharedProperties<'static>,
    pub description: &'static ThingDescription,
}

/// `CO2`, `Temperature` or `Humidity` as a path segment.
struct PropertyName(PropertyId);

impl FromStr for PropertyName {
    type Err = ();

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        PropertyId::from_name(name).map(Self).ok_or(())
    }
}

async fn things(State(state): State<AppState>) -> impl IntoResponse {
    Json([state.description])
}

async fn thing(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.description)
}

async fn properties(State(state): State<AppState>) -> impl IntoResponse {
    Json(PropertyValues::all(state.properties.values()))
}

async fn property(
    PropertyName(id): PropertyName,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(PropertyValues::single(id, state.properties.values()))
}

pub struct AppProps;

impl AppWithStateBuilder for AppProps {
    type State = AppState;
    type PathRouter = impl picoserve::routing::PathRouter<AppState>;

    fn build_app(self) -> Router<Self::PathRouter, Self::State> {
        Router::new()
            .route("/", get(things))
            .route("/things", get(things))
            .route(THING_HREF, get(thing))
            .route(PROPERTIES_HREF, get(properties))
            .route(
                (PROPERTIES_HREF, parse_path_segment::<PropertyName>()),
                get(property),
            )
    }
}

pub type WebApp = Router<<AppProps as AppWithStateBuilder>::PathRouter, AppState>;

pub fn config() -> picoserve::Config<Duration> {
    picoserve::Config::new(picoserve::Timeouts {
        start_read_request: Some(Duration::from_secs(5)),
        persistent_start_read_request: Some(Duration::from_secs(1)),
        read_request: Some(Duration::from_secs(1)),
        write: Some(Duration::from_secs(1)),
    })
    .keep_connection_alive()
}

#[embassy_executor::task(pool_size = WEB_TASK_POOL_SIZE)]
pub async fn web_task(
    id: usize,
    stack: Stack<'static>,
    app: &'static WebApp,
    config: &'static picoserve::Config<Duration>,
    state: AppState,
) -> ! {
    let mut tcp_rx_buffer = [0; 1024];
    let mut tcp_tx_buffer = [0; 1024];
    let mut http_buffer = [0; 2048];

    picoserve::listen_and_serve_with_state(
        id,
        app,
        config,
        stack,
        HTTP_PORT,
        &mut tcp_rx_buffer,
        &mut tcp_tx_buffer,
        &mut http_buffer,
        &state,
    )
    .await
}
