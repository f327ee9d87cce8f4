//! Generation options
//!
//! `Runner` holds parameters bound to a model when it is loaded, `Options`
//! adds the per-request sampling parameters. Both are plain typed values;
//! the only place they become an open key/value mapping is
//! [`Options::to_wire_map`], right before a request is serialized.
//!
//! No range validation happens here. Sentinels such as `-1` for
//! `num_predict` (infinite) or `num_gpu` (let the runtime decide) are
//! passed through untouched and the server decides what is acceptable.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How a field is treated when it sits at its zero value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WirePolicy {
    /// Always emitted; zero carries meaning for the server
    Always,
    /// Dropped from the payload at zero, false or empty
    OmitZero,
}

/// Every key produced by the typed fields
const TYPED_KEYS: &[&str] = &[
    "numa",
    "num_ctx",
    "num_batch",
    "num_gqa",
    "num_gpu",
    "main_gpu",
    "low_vram",
    "f16_kv",
    "logits_all",
    "vocab_only",
    "use_mmap",
    "use_mlock",
    "embedding_only",
    "rope_frequency_base",
    "rope_frequency_scale",
    "num_thread",
    "num_keep",
    "seed",
    "num_predict",
    "top_k",
    "top_p",
    "tfs_z",
    "typical_p",
    "repeat_last_n",
    "temperature",
    "repeat_penalty",
    "presence_penalty",
    "frequency_penalty",
    "mirostat",
    "mirostat_tau",
    "mirostat_eta",
    "penalize_newline",
    "stop",
];

/// Options that must be set when the model is loaded into memory.
///
/// Changing any of these on a later request makes the server reload
/// the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Runner {
    pub use_numa: bool,
    /// Size of the context window used to generate the next token
    pub num_ctx: i32,
    pub num_batch: i32,
    pub num_gqa: i32,
    /// Layers offloaded to the GPU(s); -1 lets the runtime decide
    pub num_gpu: i32,
    pub main_gpu: i32,
    pub low_vram: bool,
    pub f16_kv: bool,
    pub logits_all: bool,
    pub vocab_only: bool,
    pub use_mmap: bool,
    pub use_mlock: bool,
    pub embedding_only: bool,
    pub rope_frequency_base: f64,
    pub rope_frequency_scale: f64,
    pub num_thread: i32,
}

/// Per-request sampling options, with the load-time [`Runner`] embedded
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub runner: Runner,

    pub num_keep: i32,
    /// Random seed; -1 picks a new one for every request
    pub seed: i32,
    /// Maximum tokens to predict (-1 = infinite, -2 = fill context)
    pub num_predict: i32,
    pub top_k: i32,
    pub top_p: f64,
    /// Tail free sampling; 1.0 disables it
    pub tfs_z: f64,
    pub typical_p: f64,
    /// How far back to look for repetitions (0 = disabled, -1 = num_ctx)
    pub repeat_last_n: i32,
    pub temperature: f64,
    pub repeat_penalty: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    /// 0 = disabled, 1 = Mirostat, 2 = Mirostat 2.0
    pub mirostat: i32,
    pub mirostat_tau: f64,
    pub mirostat_eta: f64,
    pub penalize_newline: bool,
    pub stop: Vec<String>,

    extensions: BTreeMap<String, Value>,
}

/// Build the baseline option set used for every request
pub fn default_options() -> Options {
    Options {
        num_predict: -1,
        num_keep: 0,
        temperature: 1.0,
        top_k: 40,
        top_p: 0.9,
        tfs_z: 1.0,
        typical_p: 1.0,
        repeat_last_n: 64,
        repeat_penalty: 1.1,
        presence_penalty: 0.0,
        frequency_penalty: 0.0,
        mirostat: 0,
        mirostat_tau: 5.0,
        mirostat_eta: 0.1,
        penalize_newline: true,
        seed: -1,
        stop: Vec::new(),

        runner: Runner::default(),

        extensions: BTreeMap::new(),
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            num_ctx: 4096,
            rope_frequency_base: 10000.0,
            rope_frequency_scale: 1.0,
            num_batch: 512,
            num_gpu: -1,
            num_gqa: 1,
            num_thread: 15,
            main_gpu: 0,
            low_vram: false,
            f16_kv: true,
            logits_all: false,
            vocab_only: false,
            use_mlock: false,
            use_mmap: true,
            use_numa: false,
            embedding_only: true,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        default_options()
    }
}

impl Options {
    /// Attach a server-specific option the typed fields do not model.
    ///
    /// Extensions are written after the typed fields and can never
    /// replace a typed key.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_extension(key, value);
        self
    }

    /// In-place form of [`Options::with_extension`]
    pub fn set_extension(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extensions.insert(key.into(), value.into());
    }

    /// Extension options currently attached
    pub fn extensions(&self) -> &BTreeMap<String, Value> {
        &self.extensions
    }

    /// Convert to the open mapping sent as `options` on the wire.
    ///
    /// Each field is listed with its own [`WirePolicy`]. Keys keep the
    /// order they are inserted in.
    pub fn to_wire_map(&self) -> Map<String, Value> {
        use WirePolicy::{Always, OmitZero};

        let r = &self.runner;
        let mut wire = WireMap::default();

        wire.flag("numa", r.use_numa, OmitZero);
        wire.int("num_ctx", r.num_ctx, OmitZero);
        wire.int("num_batch", r.num_batch, OmitZero);
        wire.int("num_gqa", r.num_gqa, OmitZero);
        wire.int("num_gpu", r.num_gpu, Always);
        wire.int("main_gpu", r.main_gpu, OmitZero);
        wire.flag("low_vram", r.low_vram, OmitZero);
        wire.flag("f16_kv", r.f16_kv, Always);
        wire.flag("logits_all", r.logits_all, OmitZero);
        wire.flag("vocab_only", r.vocab_only, OmitZero);
        wire.flag("use_mmap", r.use_mmap, Always);
        wire.flag("use_mlock", r.use_mlock, OmitZero);
        wire.flag("embedding_only", r.embedding_only, OmitZero);
        wire.float("rope_frequency_base", r.rope_frequency_base, OmitZero);
        wire.float("rope_frequency_scale", r.rope_frequency_scale, OmitZero);
        wire.int("num_thread", r.num_thread, OmitZero);

        wire.int("num_keep", self.num_keep, OmitZero);
        wire.int("seed", self.seed, Always);
        wire.int("num_predict", self.num_predict, Always);
        wire.int("top_k", self.top_k, OmitZero);
        wire.float("top_p", self.top_p, OmitZero);
        wire.float("tfs_z", self.tfs_z, OmitZero);
        wire.float("typical_p", self.typical_p, OmitZero);
        wire.int("repeat_last_n", self.repeat_last_n, Always);
        wire.float("temperature", self.temperature, Always);
        wire.float("repeat_penalty", self.repeat_penalty, OmitZero);
        wire.float("presence_penalty", self.presence_penalty, OmitZero);
        wire.float("frequency_penalty", self.frequency_penalty, OmitZero);
        wire.int("mirostat", self.mirostat, Always);
        wire.float("mirostat_tau", self.mirostat_tau, OmitZero);
        wire.float("mirostat_eta", self.mirostat_eta, OmitZero);
        wire.flag("penalize_newline", self.penalize_newline, Always);
        wire.strings("stop", &self.stop);

        for (key, value) in &self.extensions {
            if TYPED_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "ignoring extension option that shadows a typed field");
                continue;
            }
            wire.map.insert(key.clone(), value.clone());
        }

        wire.map
    }
}

#[derive(Default)]
struct WireMap {
    map: Map<String, Value>,
}

impl WireMap {
    fn int(&mut self, key: &str, value: i32, policy: WirePolicy) {
        if value != 0 || policy == WirePolicy::Always {
            self.map.insert(key.to_string(), Value::from(value));
        }
    }

    fn float(&mut self, key: &str, value: f64, policy: WirePolicy) {
        if value != 0.0 || policy == WirePolicy::Always {
            self.map.insert(key.to_string(), Value::from(value));
        }
    }

    fn flag(&mut self, key: &str, value: bool, policy: WirePolicy) {
        if value || policy == WirePolicy::Always {
            self.map.insert(key.to_string(), Value::from(value));
        }
    }

    fn strings(&mut self, key: &str, values: &[String]) {
        if !values.is_empty() {
            self.map.insert(key.to_string(), Value::from(values.to_vec()));
        }
    }
}
