pub mod probe;
pub mod tempo;

pub use probe::{ffprobe_duration, probe_duration, wav_duration};
pub use tempo::{plan_tempo, TempoPlan, MAX_TEMPO, MIN_TEMPO};
