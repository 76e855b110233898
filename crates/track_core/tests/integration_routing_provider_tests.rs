use track_core::geo::{haversine_km, Coordinate};
use track_core::params::TrackingParams;
use track_core::routing::fallback::lateral_deviation_deg;
use track_core::routing::{build_route_provider, RouteProviderKind, RouteSource};

fn origin() -> Coordinate {
    Coordinate::new(31.5127, 74.3516).expect("origin")
}

fn destination() -> Coordinate {
    Coordinate::new(31.5227, 74.3616).expect("destination")
}

#[test]
fn route_provider_kind_default_is_synthetic() {
    assert_eq!(RouteProviderKind::default(), RouteProviderKind::Synthetic);
}

#[test]
fn build_route_provider_synthetic() {
    let params = TrackingParams::default().with_seed(3);
    let provider = build_route_provider(&params);
    let route = provider
        .fetch_route(origin(), destination())
        .expect("synthetic route");

    assert_eq!(route.source, RouteSource::Synthetic);
    assert_eq!(route.path.len(), params.fallback.intermediate_points + 2);
    assert_eq!(route.path.first(), origin());
    assert_eq!(route.path.last(), destination());
    let straight = haversine_km(origin(), destination());
    assert!((route.distance_km - straight * params.fallback.detour_factor).abs() < 1e-9);
    for point in route.path.points() {
        assert!(
            lateral_deviation_deg(*point, origin(), destination())
                <= params.fallback.max_offset_deg + 1e-12
        );
    }
}

#[test]
fn same_seed_gives_same_synthetic_path() {
    let params = TrackingParams::default().with_seed(42);
    let a = build_route_provider(&params)
        .fetch_route(origin(), destination())
        .expect("route");
    let b = build_route_provider(&params)
        .fetch_route(origin(), destination())
        .expect("route");
    assert_eq!(a.path, b.path);
}

#[test]
fn params_from_json_select_provider() {
    let params = TrackingParams::from_json_str(r#"{"route_provider": "Synthetic", "seed": 9}"#)
        .expect("params");
    assert_eq!(params.route_provider, RouteProviderKind::Synthetic);
    let route = build_route_provider(&params)
        .fetch_route(origin(), destination())
        .expect("route");
    assert_eq!(route.source, RouteSource::Synthetic);
}

#[cfg(feature = "http")]
#[test]
fn http_provider_falls_back_when_nothing_listens() {
    let mut params = TrackingParams::default()
        .with_seed(5)
        .with_route_provider(RouteProviderKind::Http {
            primary_url: "http://127.0.0.1:9/route".to_string(),
            alternate_url: None,
            api_key: "test-key".to_string(),
        });
    params.retry.max_attempts = 1;
    params.retry.base_delay_ms = 1;
    params.route_request_timeout_ms = 500;

    let route = build_route_provider(&params)
        .fetch_route(origin(), destination())
        .expect("fallback route");
    assert_eq!(route.source, RouteSource::Synthetic);
}
