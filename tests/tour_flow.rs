// tour_flow.rs — 多场景导览的端到端流程

use glam::Vec2;
use panorama_tour::{
    ActionType, HostRequest, OverlayId, SensorHub, Topic, TourSource, Viewer, ViewerEvent,
};
use std::cell::RefCell;
use std::rc::Rc;

const TOUR: &str = r#"{
    "options": {"fov": 80, "enableDamping": false},
    "sceneGroup": [
        {"id":"A","texPath":"a.jpg","overlays":[
            {"type":"dom","location":{"lng":0,"lat":0},"actionType":"link","linkUrl":"https://example.org/a","content":"label"},
            {"type":"mesh","location":{"lng":0,"lat":0},"actionType":"scene","sceneId":"B"},
            {"type":"mesh","location":{"x":-200,"y":0,"z":0},"actionType":"scene","sceneId":"B"},
            {"type":"mesh","location":{"x":-400,"y":0,"z":0},"actionType":"link","linkUrl":"https://example.org/far"}
        ]},
        {"id":"B","texPath":"b.jpg","lng":90,"lat":45,"overlays":[
            {"type":"dom","location":{"lng":90,"lat":45},"actionType":"scene","sceneId":"C","content":"to C"},
            {"type":"animation","category":"snow","location":{"x":0,"y":0,"z":0}}
        ]},
        {"id":"C","texPath":"c.jpg"}
    ]
}"#;

fn centre() -> Vec2 {
    Vec2::new(400.0, 300.0)
}

fn viewer_with(hub: SensorHub) -> Viewer {
    let source = TourSource::from_json(TOUR).expect("tour");
    let mut viewer = Viewer::new(source).expect("viewer").with_sensors(hub);
    viewer.resize(800, 600);
    viewer.start().expect("start");
    viewer
}

/// 完成当前挂起的加载并渲染一帧
fn settle(viewer: &mut Viewer) -> Vec<HostRequest> {
    if let Some(id) = viewer.pending_scene().map(str::to_owned) {
        viewer.complete_transition(&id, true);
    }
    viewer.tick(0.016, |_| ());
    viewer.take_requests()
}

fn record(viewer: &mut Viewer, topics: &[Topic]) -> Rc<RefCell<Vec<ViewerEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for &topic in topics {
        let log = Rc::clone(&log);
        viewer.subscribe(topic, move |e| log.borrow_mut().push(e.clone()));
    }
    log
}

fn ids(viewer: &Viewer) -> Vec<OverlayId> {
    viewer
        .overlays()
        .map(|entry| entry.overlays().map(|o| o.id).collect())
        .unwrap_or_default()
}

#[test]
fn scenes_never_share_overlays() {
    let mut viewer = viewer_with(SensorHub::new());
    settle(&mut viewer);
    let first_visit = ids(&viewer);
    assert_eq!(first_visit.len(), 4);
    assert_eq!(viewer.scene_graph().len(), 1);

    viewer.enter_next("B").expect("B");
    assert!(viewer.overlays().is_none());
    assert_eq!(viewer.scene_graph().len(), 0);

    settle(&mut viewer);
    let entry = viewer.overlays().expect("B entry");
    assert_eq!(entry.scene_id(), "B");
    assert!(entry.overlays().all(|o| o.scene_id == "B"));
    assert!(ids(&viewer).iter().all(|id| !first_visit.contains(id)));

    // 回到 A 重新创建覆盖物
    viewer.enter_next("A").expect("A");
    settle(&mut viewer);
    let second_visit = ids(&viewer);
    assert_eq!(second_visit.len(), 4);
    assert!(second_visit.iter().all(|id| !first_visit.contains(id)));
    assert_eq!(viewer.registry().live_entries(), 1);
    assert_eq!(viewer.scene_graph().len(), 1);
}

#[test]
fn scene_without_overlays_still_owns_the_cache() {
    let mut viewer = viewer_with(SensorHub::new());
    settle(&mut viewer);
    viewer.enter_next("C").expect("C");
    settle(&mut viewer);

    let entry = viewer.overlays().expect("C entry");
    assert_eq!(entry.scene_id(), "C");
    assert!(entry.is_empty());
    assert!(viewer.scene_graph().contains(entry.detects_group()));
    assert_eq!(viewer.registry().live_entries(), 1);
    assert_eq!(viewer.scene_graph().len(), 1);
}

#[test]
fn dom_label_beats_the_mesh_behind_it() {
    let mut viewer = viewer_with(SensorHub::new());
    settle(&mut viewer);
    let log = record(&mut viewer, &[Topic::OverlayClick, Topic::SceneAttachStart]);

    viewer.on_click(centre());

    let events = log.borrow();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ViewerEvent::OverlayClick { data, .. } => assert_eq!(data.action_type, ActionType::Link),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        viewer.take_requests(),
        [HostRequest::OpenLink("https://example.org/a".into())]
    );
    assert_eq!(viewer.pending_scene(), None);
}

#[test]
fn nearest_mesh_wins_along_the_ray() {
    let mut viewer = viewer_with(SensorHub::new());
    settle(&mut viewer);
    viewer.set_look(-90.0, 0.0);
    viewer.tick(0.016, |_| ());
    let log = record(&mut viewer, &[Topic::OverlayClick, Topic::SceneAttachStart]);

    viewer.on_click(centre());

    let topics: Vec<Topic> = log.borrow().iter().map(ViewerEvent::topic).collect();
    assert_eq!(topics, [Topic::OverlayClick, Topic::SceneAttachStart]);
    assert_eq!(viewer.pending_scene(), Some("B"));
    assert!(viewer.take_requests().iter().all(|r| !matches!(r, HostRequest::OpenLink(_))));
}

#[test]
fn clicking_a_scene_hotspot_starts_the_next_scene() {
    let mut viewer = viewer_with(SensorHub::new());
    settle(&mut viewer);
    viewer.enter_next("B").expect("B");
    settle(&mut viewer);

    let look = viewer.get_look();
    assert!((look.lng - 90.0).abs() < 1e-2);
    assert!((look.lat - 45.0).abs() < 1e-2);

    let entry = viewer.overlays().expect("B entry");
    let dom = entry.dom_overlays().first().expect("dom overlay");
    let position = dom.dom().and_then(|d| d.position()).expect("projected");
    assert_eq!((position.x, position.y), (400, 300));

    let log = record(&mut viewer, &[Topic::OverlayClick, Topic::SceneAttachStart]);
    viewer.on_click(position.as_vec2());

    let topics: Vec<Topic> = log.borrow().iter().map(ViewerEvent::topic).collect();
    assert_eq!(topics, [Topic::OverlayClick, Topic::SceneAttachStart]);
    assert_eq!(viewer.pending_scene(), Some("C"));
    assert!(viewer.overlays().is_none());
    assert_eq!(
        viewer.take_requests(),
        [HostRequest::LoadTexture {
            scene_id: "C".into(),
            path: "c.jpg".into()
        }]
    );
}

#[test]
fn gyro_reconnect_keeps_a_single_subscription() {
    let hub = SensorHub::new();
    let mut viewer = viewer_with(hub.clone());
    assert_eq!(hub.subscriber_count(), 0);

    viewer.start_gyro();
    viewer.start_gyro();
    assert_eq!(hub.subscriber_count(), 1);
    assert!(viewer.is_gyro_active());

    viewer.stop_gyro();
    viewer.stop_gyro();
    assert_eq!(hub.subscriber_count(), 0);

    viewer.start_gyro();
    assert_eq!(hub.subscriber_count(), 1);
    viewer.dispose();
    assert_eq!(hub.subscriber_count(), 0);
}
