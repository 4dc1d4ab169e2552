use std::time::Duration;

use gpio_gesture::{
    Direction, EdgePoller, Engine, GestureClassifier, InputEvent, LineConfig, Level, ManualClock,
    MockLevelSource, QuadratureDecoder, Thresholds,
};

fn lines(n: usize) -> Vec<LineConfig> {
    serde_json::from_value(serde_json::Value::Array(
        (0..n)
            .map(|i| serde_json::json!({ "name": format!("LINE {i}"), "gpio": 2 + i }))
            .collect(),
    ))
    .expect("valid line configs")
}

struct Rig {
    mock: MockLevelSource,
    clock: ManualClock,
    engine: Engine<MockLevelSource, ManualClock>,
    events: Vec<InputEvent>,
}

impl Rig {
    fn buttons(n: usize) -> Self {
        Self::new(n, |n| {
            Box::new(GestureClassifier::new(
                n,
                Thresholds {
                    short_press: Duration::from_millis(500),
                    long_press: Duration::from_millis(1500),
                },
            ))
        })
    }

    fn encoder() -> Self {
        Self::new(2, |_| Box::new(QuadratureDecoder::new()))
    }

    fn new(
        n: usize,
        consumer: impl FnOnce(usize) -> Box<dyn gpio_gesture::EdgeConsumer + Send>,
    ) -> Self {
        let mock = MockLevelSource::new();
        let clock = ManualClock::default();
        let poller = EdgePoller::open(mock.clone(), &lines(n), Duration::ZERO).expect("lines open");
        let engine = Engine::new(poller, consumer(n), clock.clone());
        Self {
            mock,
            clock,
            engine,
            events: Vec::new(),
        }
    }

    /// Sets `line` to `level` at `at_ms` and runs one poll pass.
    fn at(&mut self, at_ms: u64, line: usize, level: Level) {
        self.clock.set(Duration::from_millis(at_ms));
        self.mock.set_level(line, level);
        self.engine.step(&mut self.events).expect("poll pass");
    }

    /// One idle poll pass at `at_ms`.
    fn idle(&mut self, at_ms: u64) {
        self.clock.set(Duration::from_millis(at_ms));
        self.engine.step(&mut self.events).expect("poll pass");
    }

    fn gestures(&self) -> Vec<InputEvent> {
        self.events
            .iter()
            .copied()
            .filter(|e| !matches!(e, InputEvent::LineDown { .. } | InputEvent::LineUp { .. }))
            .collect()
    }
}

#[test]
fn double_tap_on_line_zero_of_two() {
    let mut rig = Rig::buttons(2);
    rig.at(0, 0, Level::High);
    rig.at(200, 0, Level::Low);
    rig.at(300, 0, Level::High);
    rig.idle(400);
    rig.at(450, 0, Level::Low);
    rig.idle(5000);
    assert_eq!(rig.gestures(), vec![InputEvent::DoubleTap { line: 0 }]);
}

#[test]
fn long_hold_is_long_press_only() {
    let mut rig = Rig::buttons(1);
    rig.at(0, 0, Level::High);
    for t in (100..=1600).step_by(100) {
        rig.idle(t);
    }
    rig.at(1700, 0, Level::Low);
    rig.idle(3000);
    assert_eq!(rig.gestures(), vec![InputEvent::LongPress { line: 0 }]);
}

#[test]
fn single_tap_is_short_press_only() {
    let mut rig = Rig::buttons(1);
    rig.at(0, 0, Level::High);
    rig.at(150, 0, Level::Low);
    rig.idle(649);
    assert!(rig.gestures().is_empty());
    rig.idle(650);
    rig.idle(2000);
    assert_eq!(rig.gestures(), vec![InputEvent::ShortPress { line: 0 }]);
}

#[test]
fn raw_edges_are_always_reported() {
    let mut rig = Rig::buttons(2);
    rig.at(0, 1, Level::High);
    rig.idle(1500);
    rig.at(2000, 1, Level::Low);
    assert_eq!(
        rig.events,
        vec![
            InputEvent::LineDown { line: 1 },
            InputEvent::LongPress { line: 1 },
            InputEvent::LineUp { line: 1 },
        ]
    );

    // a release noticed late still resolves as long, after its raw edge
    let mut rig = Rig::buttons(1);
    rig.at(0, 0, Level::High);
    rig.at(2000, 0, Level::Low);
    assert_eq!(
        rig.events,
        vec![
            InputEvent::LineDown { line: 0 },
            InputEvent::LineUp { line: 0 },
            InputEvent::LongPress { line: 0 },
        ]
    );
}

#[test]
fn quiet_lines_and_spurious_wakes_emit_nothing() {
    let mut rig = Rig::buttons(2);
    for t in 0..50 {
        if t % 7 == 0 {
            rig.mock.spurious_wake(t as usize % 2);
        }
        rig.idle(t * 10);
    }
    assert!(rig.events.is_empty());
}

#[test]
fn encoder_cycles_and_resync() {
    let mut rig = Rig::encoder();
    // A(00) -> D(10) -> C(11) -> B(01) -> A(00)
    rig.at(1, 0, Level::High);
    rig.at(2, 1, Level::High);
    rig.at(3, 0, Level::Low);
    rig.at(4, 1, Level::Low);
    assert_eq!(
        rig.events,
        vec![
            InputEvent::Rotate {
                direction: Direction::Clockwise
            };
            4
        ]
    );

    rig.events.clear();
    // A -> C in one pass is a jump; C -> B is only a baseline
    rig.mock.set_level(0, Level::High);
    rig.at(5, 1, Level::High);
    rig.at(6, 0, Level::Low);
    rig.at(7, 1, Level::Low);
    assert_eq!(
        rig.events,
        vec![
            InputEvent::Rotate {
                direction: Direction::Invalid
            },
            InputEvent::Rotate {
                direction: Direction::Clockwise
            },
        ]
    );
}

#[test]
fn encoder_counter_clockwise_cycle() {
    let mut rig = Rig::encoder();
    // A(00) -> B(01) -> C(11) -> D(10) -> A(00)
    rig.at(1, 1, Level::High);
    rig.at(2, 0, Level::High);
    rig.at(3, 1, Level::Low);
    rig.at(4, 0, Level::Low);
    assert_eq!(
        rig.events,
        vec![
            InputEvent::Rotate {
                direction: Direction::CounterClockwise
            };
            4
        ]
    );
}
