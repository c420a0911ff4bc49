//! NNUE network structure, forward pass, and runtime weight loading.

use std::sync::{OnceLock, RwLock};

use tracing::warn;

use super::accumulator::Accumulator;

/// Hidden-layer dimension: 1024 neurons.
pub const HIDDEN: usize = 1024;

/// Number of output buckets (MaterialCount<8>).
pub const NUM_BUCKETS: usize = 8;

/// First-layer quantization factor.
const QA: i16 = 255;

/// Output-layer quantization factor.
const QB: i16 = 64;

/// Evaluation scale (maps to centipawns).
const SCALE: i32 = 400;

/// Quantized NNUE network.
///
/// Binary layout (little-endian, `repr(C)`):
/// - `feature_weights`: 768 [`Accumulator`]s (768 * 1024 i16)
/// - `feature_bias`: 1 [`Accumulator`] (1024 i16)
/// - `output_weights`: NUM_BUCKETS * 2 * HIDDEN i16 (transposed, bucket-contiguous)
/// - `output_bias`: NUM_BUCKETS i16
#[repr(C)]
pub struct Network {
    /// Column-major `HIDDEN x 768` weight matrix. Quantization: QA.
    pub(crate) feature_weights: [Accumulator; 768],
    /// Bias vector of dimension HIDDEN. Quantization: QA.
    pub(crate) feature_bias: Accumulator,
    /// Row vectors `NUM_BUCKETS x (2 * HIDDEN)` output weights, bucket-contiguous. Quantization: QB.
    output_weights: [i16; NUM_BUCKETS * 2 * HIDDEN],
    /// Per-bucket scalar output bias. Quantization: QA * QB.
    output_bias: [i16; NUM_BUCKETS],
}

/// Expected size in bytes of a weights file, matching [`Network`]'s layout.
pub const NETWORK_SIZE: usize = std::mem::size_of::<Network>();

fn loaded() -> &'static RwLock<Option<Box<Network>>> {
    static LOADED: OnceLock<RwLock<Option<Box<Network>>>> = OnceLock::new();
    LOADED.get_or_init(|| RwLock::new(None))
}

/// Error loading a network weights file.
#[derive(Debug, thiserror::Error)]
pub enum NetworkLoadError {
    /// The file could not be read.
    #[error("could not read NNUE weights file: {0}")]
    Io(#[from] std::io::Error),
    /// The file size does not match the expected network layout.
    #[error("NNUE weights file has wrong size: expected {expected} bytes, found {found}")]
    SizeMismatch {
        /// Expected byte count ([`NETWORK_SIZE`]).
        expected: usize,
        /// Actual byte count read from the file.
        found: usize,
    },
}

/// Load a network from `path` and install it as the active evaluator.
///
/// On failure the previously loaded network (if any) is left untouched, so
/// a bad `EvalFile` value degrades to "no NNUE" rather than corrupting a
/// working one.
pub fn load_from_file(path: &str) -> Result<(), NetworkLoadError> {
    let bytes = std::fs::read(path)?;
    if bytes.len() != NETWORK_SIZE {
        return Err(NetworkLoadError::SizeMismatch {
            expected: NETWORK_SIZE,
            found: bytes.len(),
        });
    }

    // SAFETY: `bytes` has exactly `size_of::<Network>()` bytes and `Network`
    // is `repr(C)` with only fixed-size integer fields, so any bit pattern
    // of the right length is a valid `Network`.
    let network: Box<Network> = unsafe {
        let raw = Box::into_raw(bytes.into_boxed_slice()) as *mut Network;
        Box::from_raw(raw)
    };

    *loaded().write().expect("NNUE network lock poisoned") = Some(network);
    Ok(())
}

/// Drop the currently loaded network, reverting evaluation to the classical
/// fallback.
pub fn unload() {
    *loaded().write().expect("NNUE network lock poisoned") = None;
}

/// Run `f` with the currently loaded network, or return `None` if no
/// network has been loaded yet.
pub fn with_loaded<T>(f: impl FnOnce(&Network) -> T) -> Option<T> {
    let guard = loaded().read().expect("NNUE network lock poisoned");
    guard.as_deref().map(f)
}

impl Network {
    /// Forward pass: SCReLU activation, output dequantization.
    ///
    /// Returns centipawn evaluation from the `us` perspective.
    /// `bucket` selects the output head corresponding to the current material count.
    pub fn evaluate(&self, us: &Accumulator, them: &Accumulator, bucket: usize) -> i32 {
        let mut output = 0i32;
        let base = bucket * 2 * HIDDEN;

        for (&x, &w) in us.vals.iter().zip(&self.output_weights[base..base + HIDDEN]) {
            output += screlu(x) * i32::from(w);
        }

        for (&x, &w) in them.vals.iter().zip(&self.output_weights[base + HIDDEN..base + 2 * HIDDEN]) {
            output += screlu(x) * i32::from(w);
        }

        // Dequantize: QA*QA*QB -> QA*QB
        output /= i32::from(QA);
        output += i32::from(self.output_bias[bucket]);
        output *= SCALE;
        // Final dequantization: remove QA*QB
        output /= i32::from(QA) * i32::from(QB);

        output
    }
}

/// SCReLU activation: clamp to [0, QA] then square.
#[inline]
fn screlu(x: i16) -> i32 {
    let y = i32::from(x).clamp(0, i32::from(QA));
    y * y
}

/// Log and discard a failed `EvalFile` load, per the documented soft-fail
/// path: the engine keeps running on the classical evaluator.
pub fn try_load(path: &str) -> bool {
    match load_from_file(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path, error = %err, "failed to load NNUE weights, falling back to PST evaluation");
            false
        }
    }
}
