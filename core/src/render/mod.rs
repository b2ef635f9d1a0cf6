pub mod engine;
pub mod memory;
pub mod popup;
pub mod style;
pub mod surface;

pub use engine::{EngineConfig, EngineState, MountOutcome, RenderEngine, RenderReport};
pub use memory::MemorySurface;
pub use popup::{marker_label, render_popup, MarkerKind, PopupView};
pub use style::{palette_color, Color, StrokeStyle, StylePreset, LIVE_MARKER_COLOR, PALETTE};
pub use surface::{
    ArrowLayer, Layer, LayerId, LegendEntry, LegendLayer, MapSurface, MarkerLayer,
    PolylineLayer, SurfaceError, TileLayer,
};
