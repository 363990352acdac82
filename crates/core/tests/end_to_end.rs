use serde_json::json;
use teammap_core::cluster::{self, ClusterOptions};
use teammap_core::engine::HeadlessFactory;
use teammap_core::icons::NoPhotos;
use teammap_core::models::{Coordinate, RawRecord};
use teammap_core::validate;
use teammap_core::viewport::Viewport;
use teammap_core::{EngineConfig, PeopleMap};

fn records() -> Vec<RawRecord> {
    serde_json::from_value(json!([
        {
            "user": { "id": "east-1", "displayName": "Ada" },
            "location": { "latitude": 40.0, "longitude": -75.0 },
            "location_type": "address"
        },
        {
            "user": { "id": "east-2", "displayName": "Grace" },
            "location": { "latitude": "40.0", "longitude": "-75.0" },
            "location_type": "office"
        },
        {
            "user": { "id": "west-1", "displayName": "Linus" },
            "location": { "latitude": 34.0, "longitude": -118.0 },
            "location_type": "phone"
        }
    ]))
    .unwrap()
}

#[test]
fn test_duplicates_cluster_and_distant_point_stays_single() {
    let points = validate::validate(&records()).into_points().unwrap();
    assert_eq!(points.len(), 3);

    let config = EngineConfig::default();
    let view = Viewport::new(Coordinate::new(37.0, -96.0), 4.0, config.viewport_size());
    let result = cluster::cluster(&points, &view, &ClusterOptions::from(&config));

    assert_eq!(result.clusters.len(), 1);
    assert_eq!(result.clusters[0].member_count, 2);
    assert_eq!(result.clusters[0].member_point_ids, vec!["east-1", "east-2"]);
    assert!(result.clusters[0].same_location);
    assert_eq!(result.singletons.len(), 1);
    assert_eq!(result.singletons[0].id, "west-1");
    assert_eq!(result.shape_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_people_map_draws_two_shapes() {
    let mut map = PeopleMap::new(EngineConfig::default(), HeadlessFactory::default(), NoPhotos);
    map.start().await.unwrap();
    map.load(&records()).await.unwrap();

    let engine = map.engine().unwrap();
    assert_eq!(engine.shapes().len(), 2);
    assert_eq!(engine.shapes().iter().filter(|s| s.is_cluster()).count(), 1);
    assert!(engine.image("cluster-2").is_some());

    // The pair stays together however far in the camera goes
    for zoom in [8.0, 12.5, 17.0, 20.0] {
        map.set_zoom(zoom).unwrap();
        assert_eq!(map.settle().await.unwrap(), Some(2));
        assert_eq!(map.clustering().clusters[0].member_count, 2);
    }
}
