//! OSRM adapter against a live HTTP endpoint.
//!
//! A throwaway container serves a canned `/route/v1` answer, so no OSRM
//! dataset has to be prepared. Needs a docker daemon, hence `#[ignore]`.

use serde_json::json;

use testcontainers::core::IntoContainerPort;
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, GenericImage, ImageExt, TestcontainersError};

use dispatch_routing::geo_key::{Coordinate, RoutingPolicy};
use dispatch_routing::normalize::normalize;
use dispatch_routing::osrm::{OsrmClient, OsrmConfig};
use dispatch_routing::traits::RoutingProvider;

fn canned_osrm_body() -> String {
    json!({
        "code": "Ok",
        "routes": [{
            "distance": 1830.4,
            "duration": 265.0,
            "legs": [{
                "steps": [
                    {
                        "geometry": {"coordinates": [[-115.16882, 36.10236], [-115.1745, 36.1162]]},
                        "name": "Las Vegas Boulevard South",
                        "maneuver": {"type": "depart"}
                    },
                    {
                        "geometry": {"coordinates": [[-115.1745, 36.1162], [-115.1767, 36.1126]]},
                        "name": "Flamingo Road",
                        "maneuver": {"type": "turn", "modifier": "left"}
                    }
                ]
            }]
        }]
    })
    .to_string()
}

fn echo_container(body: &str) -> Result<(Container<GenericImage>, String), TestcontainersError> {
    let image = GenericImage::new("hashicorp/http-echo", "1.0")
        .with_exposed_port(5678.tcp())
        .with_cmd(vec![format!("-text={body}"), "-listen=:5678".to_string()])
        .with_startup_timeout(std::time::Duration::from_secs(30));

    let container = image.start()?;
    let port = container.get_host_port_ipv4(5678.tcp())?;
    let base_url = format!("http://127.0.0.1:{}", port);

    Ok((container, base_url))
}

#[test]
#[ignore = "requires a docker daemon"]
fn osrm_route_is_reshaped_and_normalizable() {
    let (container, base_url) = echo_container(&canned_osrm_body()).expect("start echo container");

    let config = OsrmConfig {
        base_url,
        profile: "car".to_string(),
        timeout_secs: 10,
    };
    let client = OsrmClient::new(config).expect("build OSRM client");

    let origin = Coordinate::new(-115.16882, 36.10236);
    let destination = Coordinate::new(-115.1767, 36.1126);

    let routed = {
        let start = std::time::Instant::now();
        let mut last = client.route(origin, destination, &[], &RoutingPolicy::Fastest);
        while last.is_err() && start.elapsed() < std::time::Duration::from_secs(15) {
            std::thread::sleep(std::time::Duration::from_millis(500));
            last = client.route(origin, destination, &[], &RoutingPolicy::Fastest);
        }
        last
    };
    let raw = match routed {
        Ok(raw) => raw,
        Err(err) => {
            if let Ok(stderr) = container.stderr_to_vec() {
                eprintln!("echo stderr:\n{}", String::from_utf8_lossy(&stderr));
            }
            panic!("routing call failed: {err}");
        }
    };

    assert_eq!(raw["status"], "Ok");
    assert_eq!(raw["routes"][0]["steps"][1]["instruction"], "turn left onto Flamingo Road");

    let normalized = normalize(Some(&raw));
    assert_eq!(normalized.source, Some("routes.steps"));
    assert_eq!(normalized.path.path_points.len(), 3);
    assert!((normalized.path.total_distance - 1.8304).abs() < 1e-9);
    assert_eq!(normalized.path.estimated_time, 4.0);

    drop(container);
}
