// [apps/agent/src/fingerprint/mod.rs]
//! Matching de huellas contra bases de reglas cargadas en `rules`.

pub mod os_matcher;
