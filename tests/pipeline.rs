//! End-to-end pipeline tests over an in-memory screen and a recording key
//! injector: load → start → observe dispatches → stop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tokio::time::{sleep, Duration};

use pixeltrigger::{
    CaptureError, CaptureRect, Condition, DispatchError, Engine, EngineSettings, EngineState,
    Frame, FrameSource, KeyBinding, KeyInjector, Modifier, ModifierState, Point, PressRange,
    Profile, Rgb, Rule, SampleGeometry,
};

/// Screen stand-in: unset pixels read as black.
#[derive(Default)]
struct FakeScreen {
    pixels: Mutex<HashMap<(i32, i32), Rgb>>,
}

impl FakeScreen {
    fn set(&self, x: i32, y: i32, color: Rgb) {
        self.pixels.lock().unwrap().insert((x, y), color);
    }
}

impl FrameSource for FakeScreen {
    fn capture(&self, rect: &CaptureRect) -> Result<Frame, CaptureError> {
        let mut img = RgbaImage::new(rect.width, rect.height);
        let pixels = self.pixels.lock().unwrap();
        for (&(x, y), color) in pixels.iter() {
            if rect.contains(Point::new(x, y)) {
                img.put_pixel(
                    (x - rect.left) as u32,
                    (y - rect.top) as u32,
                    Rgba([color.r, color.g, color.b, 255]),
                );
            }
        }
        Frame::new(*rect, img)
    }
}

#[derive(Default)]
struct RecordingInjector {
    events: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingInjector {
    fn count(&self, key: &str, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, e)| k.as_str() == key && *e == kind)
            .count()
    }

    fn total_events(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Every key's event stream must alternate down/up and end on up.
    fn assert_balanced(&self) {
        let events = self.events.lock().unwrap();
        let mut held: HashMap<String, bool> = HashMap::new();
        for (key, kind) in events.iter() {
            let entry = held.entry(key.clone()).or_insert(false);
            match *kind {
                "down" => {
                    assert!(!*entry, "key '{}' pressed while already down", key);
                    *entry = true;
                }
                "up" => {
                    assert!(*entry, "key '{}' released without a press", key);
                    *entry = false;
                }
                _ => unreachable!(),
            }
        }
        for (key, down) in held {
            assert!(!down, "key '{}' left dangling after stop", key);
        }
    }
}

impl KeyInjector for RecordingInjector {
    fn key_down(&self, key: &str) -> Result<(), DispatchError> {
        self.events.lock().unwrap().push((key.to_string(), "down"));
        Ok(())
    }
    fn key_up(&self, key: &str) -> Result<(), DispatchError> {
        self.events.lock().unwrap().push((key.to_string(), "up"));
        Ok(())
    }
    fn modifier_down(&self, _m: Modifier) -> Result<(), DispatchError> {
        Ok(())
    }
    fn modifier_up(&self, _m: Modifier) -> Result<(), DispatchError> {
        Ok(())
    }
}

fn fast_settings() -> EngineSettings {
    EngineSettings {
        tick_delay_ms_min: 5,
        tick_delay_ms_max: 10,
        press_ms_min: 1,
        press_ms_max: 1,
        cluster_epsilon: 20,
    }
}

fn rule(id: &str, key: &str, x: i32, y: i32, color: Rgb) -> Rule {
    Rule {
        id: id.to_string(),
        geometry: SampleGeometry::Pixel {
            point: Point::new(x, y),
            color,
        },
        tolerance: 0,
        inverted: false,
        binding: KeyBinding {
            key: key.to_string(),
            modifiers: vec![],
            press: Some(PressRange { min_ms: 1, max_ms: 1 }),
        },
        group: None,
        priority: 0,
        conditions: vec![],
        independent: false,
        enabled: true,
        fire: true,
    }
}

fn harness() -> (Arc<FakeScreen>, Arc<RecordingInjector>, Engine) {
    let _ = env_logger::builder().is_test(true).try_init();
    let screen = Arc::new(FakeScreen::default());
    let injector = Arc::new(RecordingInjector::default());
    let engine = Engine::new(screen.clone(), injector.clone(), fast_settings());
    (screen, injector, engine)
}

#[tokio::test]
async fn matching_pixel_fires_the_bound_key() {
    let (screen, injector, mut engine) = harness();
    screen.set(5, 5, Rgb::new(10, 10, 10));

    let mut events = engine.activation_events();
    engine
        .load(Profile::new(
            "p",
            vec![rule("A", "Q", 5, 5, Rgb::new(10, 10, 10))],
        ))
        .unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(300)).await;
    engine.stop().await.unwrap();

    assert!(injector.count("Q", "down") >= 1);
    injector.assert_balanced();

    let change = events.try_recv().expect("expected an activation change");
    assert_eq!(change.rule, "A");
    assert!(change.eligible);
}

#[tokio::test]
async fn snapshot_reflects_raw_match_and_resolved_eligibility() {
    let (screen, _injector, mut engine) = harness();
    // B's pixel matches (black on black), but its dependency A does not.
    screen.set(5, 5, Rgb::new(99, 99, 99));

    let mut b = rule("B", "W", 6, 5, Rgb::new(0, 0, 0));
    b.conditions = vec![Condition {
        rule: "A".into(),
        required: true,
    }];
    engine
        .load(Profile::new(
            "p",
            vec![rule("A", "Q", 5, 5, Rgb::new(10, 10, 10)), b],
        ))
        .unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(100)).await;

    let snapshot = engine.snapshot();
    assert!(!snapshot["A"].eligible);
    assert!(snapshot["B"].matched, "B's raw match should survive");
    assert!(!snapshot["B"].eligible, "B must be gated by A");

    engine.stop().await.unwrap();
}

#[tokio::test]
async fn dependency_blocks_dispatch_when_parent_inactive() {
    let (_screen, injector, mut engine) = harness();
    // A's reference color never appears, B matches the black screen.
    let mut b = rule("B", "W", 6, 5, Rgb::new(0, 0, 0));
    b.conditions = vec![Condition {
        rule: "A".into(),
        required: true,
    }];
    engine
        .load(Profile::new(
            "p",
            vec![rule("A", "Q", 5, 5, Rgb::new(10, 10, 10)), b],
        ))
        .unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(200)).await;
    engine.stop().await.unwrap();

    assert_eq!(injector.count("W", "down"), 0);
    assert_eq!(injector.count("Q", "down"), 0);
}

#[tokio::test]
async fn required_false_condition_enables_on_inactive_parent() {
    let (_screen, injector, mut engine) = harness();
    let mut b = rule("B", "W", 6, 5, Rgb::new(0, 0, 0));
    b.conditions = vec![Condition {
        rule: "A".into(),
        required: false,
    }];
    engine
        .load(Profile::new(
            "p",
            vec![rule("A", "Q", 5, 5, Rgb::new(10, 10, 10)), b],
        ))
        .unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(300)).await;
    engine.stop().await.unwrap();

    assert!(injector.count("W", "down") >= 1);
    injector.assert_balanced();
}

#[tokio::test]
async fn group_priority_selects_a_single_winner() {
    let (screen, injector, mut engine) = harness();
    screen.set(5, 5, Rgb::new(10, 10, 10));
    screen.set(6, 5, Rgb::new(10, 10, 10));

    let mut c = rule("C", "C", 5, 5, Rgb::new(10, 10, 10));
    c.group = Some("G1".into());
    c.priority = 1;
    let mut d = rule("D", "D", 6, 5, Rgb::new(10, 10, 10));
    d.group = Some("G1".into());
    d.priority = 5;

    engine.load(Profile::new("p", vec![c, d])).unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(400)).await;
    engine.stop().await.unwrap();

    assert!(injector.count("C", "down") >= 1, "lowest priority value fires");
    assert_eq!(injector.count("D", "down"), 0, "loser is suppressed");
    injector.assert_balanced();
}

#[tokio::test]
async fn observe_only_rule_anchors_dependents_without_firing() {
    let (screen, injector, mut engine) = harness();
    screen.set(5, 5, Rgb::new(10, 10, 10));
    screen.set(6, 5, Rgb::new(20, 20, 20));

    let mut anchor = rule("Anchor", "Q", 5, 5, Rgb::new(10, 10, 10));
    anchor.fire = false;
    let mut child = rule("Child", "W", 6, 5, Rgb::new(20, 20, 20));
    child.conditions = vec![Condition {
        rule: "Anchor".into(),
        required: true,
    }];

    engine.load(Profile::new("p", vec![anchor, child])).unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(300)).await;
    engine.stop().await.unwrap();

    assert_eq!(injector.count("Q", "down"), 0, "observe-only never fires");
    assert!(injector.count("W", "down") >= 1, "dependent chains off it");
}

#[tokio::test]
async fn independent_rule_dispatches_from_its_own_loop() {
    let (screen, injector, mut engine) = harness();
    screen.set(500, 500, Rgb::new(10, 10, 10));

    let mut indie = rule("I", "E", 500, 500, Rgb::new(10, 10, 10));
    indie.independent = true;

    engine.load(Profile::new("p", vec![indie])).unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(300)).await;
    engine.stop().await.unwrap();

    assert!(injector.count("E", "down") >= 1);
    injector.assert_balanced();
}

#[tokio::test]
async fn stop_joins_tasks_and_leaves_no_dangling_key_down() {
    let (screen, injector, mut engine) = harness();
    screen.set(500, 500, Rgb::new(10, 10, 10));

    let mut indie = rule("I", "E", 500, 500, Rgb::new(10, 10, 10));
    indie.independent = true;
    // Long hold so stop lands mid-dispatch.
    indie.binding.press = Some(PressRange {
        min_ms: 200,
        max_ms: 200,
    });

    engine.load(Profile::new("p", vec![indie])).unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(80)).await;
    engine.stop().await.unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);

    injector.assert_balanced();

    // Join was complete: nothing keeps running after stop returns.
    let settled = injector.total_events();
    sleep(Duration::from_millis(300)).await;
    assert_eq!(injector.total_events(), settled);
}

struct HeldShift;
impl ModifierState for HeldShift {
    fn is_held(&self, modifier: Modifier) -> bool {
        modifier == Modifier::Shift
    }
}

#[tokio::test]
async fn guarded_modifier_pauses_the_shared_tick() {
    let screen = Arc::new(FakeScreen::default());
    let injector = Arc::new(RecordingInjector::default());
    let mut engine = Engine::new(screen.clone(), injector.clone(), fast_settings())
        .with_modifier_state(Arc::new(HeldShift));

    screen.set(5, 5, Rgb::new(10, 10, 10));
    let mut profile = Profile::new("p", vec![rule("A", "Q", 5, 5, Rgb::new(10, 10, 10))]);
    profile.pause_on_modifiers = vec![Modifier::Shift];

    engine.load(profile).unwrap();
    engine.start().unwrap();
    sleep(Duration::from_millis(200)).await;
    engine.stop().await.unwrap();

    assert_eq!(injector.total_events(), 0, "loop must idle while shift is held");
}
