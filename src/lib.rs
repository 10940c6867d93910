//! epigimp: a layered raster editing engine.
//!
//! The [`editor::Editor`] facade is the single entry point. It owns the
//! [`Document`] along with its display buffer and recomposites after every
//! mutating call.

pub mod canvas;
pub mod cli;
pub mod command;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod history;
pub mod interaction;
pub mod io;
pub mod logger;
pub mod ops;
pub mod selection;

pub use canvas::{BlendMode, Document, Layer, LayerId, RasterBuffer};
pub use command::EditorCommand;
pub use config::EditorConfig;
pub use editor::Editor;
pub use error::{EngineError, EngineResult};
