mod backend;
mod clock;
mod config;
mod encoder;
mod engine;
mod error;
mod event;
mod gesture;
mod hub;
mod poller;
mod provision;
mod routes;
mod session;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    AppConfig, BackendKind, EdgeDetect, EngineKind, HttpConfig, LineConfig, PollMode, TimingConfig,
};
pub use encoder::{CHANNEL_A, CHANNEL_B, EncoderState, QuadratureDecoder, direction};
pub use engine::{EdgeConsumer, Engine};
pub use error::GestureError;
pub use event::{Direction, EventSink, InputEvent, Level};
pub use gesture::{Branch, Gesture, GestureClassifier, GestureState, LineClassifier, Thresholds};
pub use hub::{DispatchedEvent, EventHub, LineDescriptor, SessionStatus};
pub use poller::{EdgePoller, LevelChange, LevelSource};
pub use provision::SysfsProvisioner;
pub use routes::AppState;
pub use session::{Session, SessionHandle};

#[cfg(feature = "hardware-gpio")]
pub use backend::{GpiodLine, LibgpiodLevelSource};
pub use backend::{MockHandle, MockLevelSource, SysfsLevelSource, SysfsLine};
