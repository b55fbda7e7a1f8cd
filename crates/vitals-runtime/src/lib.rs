//! Vitals Runtime
//!
//! Loads a converted ONNX artifact and runs sample batches through it with
//! tract. Also provides a native predictor over the source pipeline so the
//! two can be compared on the same inputs.

pub mod predictor;
pub mod session;
pub mod verify;

pub use predictor::{Prediction, Predictor};
pub use session::{InputInfo, OnnxSession};
pub use verify::{compare, verify, NativePredictor, VerificationReport, DEFAULT_TOLERANCE};
