//! In-process evaluation of generated scripts.
//!
//! Only built with the `vapoursynth` feature. A [`ScriptClip`] is evaluated
//! by the local VapourSynth install and its output node read frame by frame,
//! which is how Wibbly collects metrics.

use std::sync::Arc;

use parking_lot::Mutex;
use vapoursynth::map::ValueType;
use vapoursynth::prelude::*;

use super::{ClipError, ClipResult, MetricsSource, ScriptClip};
use crate::models::{FrameProps, PropValue};

/// Whether a VapourSynth core can be created at all.
pub fn is_available() -> bool {
    let script = "import vapoursynth as vs\ncore = vs.core\ncore.std.BlankClip().set_output()";
    Environment::from_script(script).is_ok()
}

/// Whether plugin namespace `namespace` is loaded.
pub fn is_plugin_available(namespace: &str) -> bool {
    let script = format!(
        "import vapoursynth as vs\ncore = vs.core\ncore.{}\ncore.std.BlankClip().set_output()",
        namespace
    );
    Environment::from_script(&script).is_ok()
}

struct VsEnvironment {
    #[allow(dead_code)]
    leaked_env: &'static Environment,
    node: Node<'static>,
}

// The node is only touched behind the mutex.
unsafe impl Send for VsEnvironment {}
unsafe impl Sync for VsEnvironment {}

/// Output node of an evaluated [`ScriptClip`].
pub struct VapourSynthMetrics {
    num_frames: usize,
    env: Arc<Mutex<Option<VsEnvironment>>>,
}

impl VapourSynthMetrics {
    /// Check plugins, evaluate `clip` and keep its output node.
    pub fn evaluate(clip: &ScriptClip) -> ClipResult<Self> {
        clip.check_plugins(is_plugin_available)?;

        let script = clip.to_script();
        tracing::debug!("[VapourSynth] Script:\n{}", script);

        let environment = Environment::from_script(&script)
            .map_err(|e| ClipError::host(format!("script evaluation failed: {}", e)))?;
        // Nodes borrow the environment; it lives as long as the process.
        let leaked_env: &'static Environment = Box::leak(Box::new(environment));
        let (node, _) = leaked_env
            .get_output(0)
            .map_err(|e| ClipError::host(format!("no output node: {}", e)))?;

        let num_frames = node.info().num_frames;
        if num_frames != clip.num_frames() {
            tracing::warn!(
                "[VapourSynth] Script reports {} frames, expected {}",
                num_frames,
                clip.num_frames()
            );
        }
        tracing::info!("[VapourSynth] Evaluated analysis chain: {} frames", num_frames);

        Ok(Self {
            num_frames,
            env: Arc::new(Mutex::new(Some(VsEnvironment { leaked_env, node }))),
        })
    }
}

impl MetricsSource for VapourSynthMetrics {
    fn frame_count(&self) -> usize {
        self.num_frames
    }

    fn frame_props(&self, n: usize) -> ClipResult<FrameProps> {
        if n >= self.num_frames {
            return Err(ClipError::out_of_range(n, self.num_frames));
        }
        let guard = self.env.lock();
        let vs_env = guard
            .as_ref()
            .ok_or_else(|| ClipError::host("environment already closed"))?;

        let frame = vs_env
            .node
            .get_frame(n)
            .map_err(|e| ClipError::host(format!("failed to get frame {}: {}", n, e)))?;
        let map = frame.props();

        let mut props = FrameProps::new();
        for key in map.keys() {
            let value = read_prop(&map, key)
                .map_err(|e| ClipError::host(format!("frame {} prop {}: {}", n, key, e)))?;
            if let Some(value) = value {
                props.insert(key.to_string(), value);
            }
        }
        Ok(props)
    }
}

impl Drop for VapourSynthMetrics {
    fn drop(&mut self) {
        *self.env.lock() = None;
    }
}

/// Nodes, frames and functions are skipped.
fn read_prop(map: &Map, key: &str) -> Result<Option<PropValue>, vapoursynth::map::Error> {
    let count = map.value_count(key)?;
    let value = match map.value_type(key)? {
        ValueType::Int if count == 1 => Some(PropValue::Int(map.get_int(key)?)),
        ValueType::Int => Some(PropValue::IntArray(map.get_int_iter(key)?.collect())),
        ValueType::Float if count == 1 => Some(PropValue::Float(map.get_float(key)?)),
        ValueType::Float => Some(PropValue::FloatArray(map.get_float_iter(key)?.collect())),
        ValueType::Data => Some(PropValue::Data(
            String::from_utf8_lossy(map.get_data(key)?).into_owned(),
        )),
        _ => None,
    };
    Ok(value)
}
